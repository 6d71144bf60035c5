//! Core wire types for carrying WRP messages over HTTP.
//!
//! This crate provides the pieces shared by the encoder and decoder in the
//! `wrphttp` crate.
//!
//! ## Modules
//!
//! - [`error`]: Error taxonomy and the validation error type
//! - [`message`]: The message model and the validator hook
//! - [`media_type`]: Media type registry
//! - [`header_style`]: Octet-stream header naming styles and projection
//! - [`compression`]: Compression configuration types
//! - [`codec`]: Streaming compressor and decompression
//! - [`format`]: Per-format message serialization
//! - [`multipart`]: `multipart/mixed` framing

mod codec;
mod compression;
mod error;
mod format;
mod header_style;
mod media_type;
mod message;
mod multipart;

pub use codec::*;
pub use compression::*;
pub use error::*;
pub use format::*;
pub use header_style::*;
pub use media_type::*;
pub use message::*;
pub use multipart::*;
