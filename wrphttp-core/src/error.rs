//! Error types for WRP-over-HTTP encoding, decoding and negotiation.
//!
//! This module provides:
//! - [`Error`]: every failure the encoder, decoder and negotiator can report
//! - [`ValidationError`]: the error returned by a [`Validator`](crate::Validator) hook

/// Error returned by a message validator.
///
/// Validators are external hooks; their error is carried to the caller
/// unchanged inside [`Error::Validation`].
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    /// Create a new validation error with the given message.
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Get the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors produced while building encoders, encoding, decoding or negotiating.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An encoder option failed while the encoder was being built.
    ///
    /// No encoder is produced when this is returned.
    #[error("invalid encoder configuration: {0}")]
    Configuration(#[source] Box<Error>),

    /// Zero messages were handed to the encoder.
    #[error("no messages provided")]
    EmptyInput,

    /// A missing request or response was handed to the decoder.
    #[error("{0} is nil")]
    NilInput(&'static str),

    /// The media type is not one this crate understands.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// An octet-stream `style` parameter is not one of the known tokens.
    #[error("unsupported octet-stream style: {0}, must be one of \"\", \"x-xmidt\", \"x-midt\", \"xmidt\", \"x-webpa\"")]
    InvalidStyle(String),

    /// The MIME string could not be parsed at all.
    #[error("malformed media type {value:?}: {reason}")]
    MalformedMediaType { value: String, reason: String },

    /// A multipart Content-Type without a boundary parameter.
    #[error("missing boundary in Content-Type: {0}")]
    MissingBoundary(String),

    /// The Content-Encoding token is not supported.
    #[error("unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    /// A message failed a validator hook.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Message encoding or compression failed.
    #[error("encode error: {0}")]
    Encode(String),

    /// Message decoding, decompression or body read failed.
    #[error("decode error: {0}")]
    Decode(String),

    /// Negotiation found no acceptable media type.
    #[error("no acceptable content type found")]
    NoAcceptableType,

    /// The HTTP request or response could not be constructed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl Error {
    /// Create an encode error from any displayable cause.
    pub fn encode<E: std::fmt::Display>(err: E) -> Self {
        Error::Encode(err.to_string())
    }

    /// Create a decode error from any displayable cause.
    pub fn decode<E: std::fmt::Display>(err: E) -> Self {
        Error::Decode(err.to_string())
    }

    /// Create a malformed media type error.
    pub fn malformed<V: Into<String>, R: std::fmt::Display>(value: V, reason: R) -> Self {
        Error::MalformedMediaType {
            value: value.into(),
            reason: reason.to_string(),
        }
    }
}
