//! WRP messages over HTTP.
//!
//! This crate turns lists of WRP messages into HTTP header sets and streamed
//! bodies, and back again.
//!
//! ## Features
//!
//! - Five wire representations: JSON, msgpack, JSON lines, msgpack lines, and
//!   octet-stream with the message fields carried as headers
//! - Four octet-stream header naming styles, all accepted on decode
//! - `gzip`, `deflate` and `zlib` content encodings
//! - `multipart/mixed` framing for batches, with chunking for the line formats
//! - Content negotiation from `Accept` / `Content-Type`
//!
//! ## Example
//!
//! ```ignore
//! use wrphttp::{CompressionLevel, Decoder, Encoder, Message, MessageType};
//!
//! let encoder = Encoder::builder()
//!     .as_jsonl()
//!     .encode_gzip(CompressionLevel::Default)
//!     .build()?;
//!
//! let req = encoder.new_request("POST", "http://example.com/api/v2/notify", msgs)?;
//! let decoded = Decoder::new().decode_request(req).await?;
//! ```
//!
//! ## Answering with the negotiated type
//!
//! ```ignore
//! use http::StatusCode;
//! use wrphttp::Encoder;
//!
//! let encoder = Encoder::builder().as_negotiated(request.headers()).build()?;
//! let response = encoder.new_response(StatusCode::OK, replies)?;
//! ```

mod body;
mod builder;
mod decoder;
mod encoder;
mod negotiate;
mod options;

pub use body::EncodedBody;
pub use builder::EncoderBuilder;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use negotiate::{WILDCARD_FALLBACK, negotiate, negotiate_media_type, negotiate_request};
pub use options::{DEFAULT_MAX_ITEMS_PER_CHUNK, EncoderConfig, EncoderOption};

pub use wrphttp_core::*;
