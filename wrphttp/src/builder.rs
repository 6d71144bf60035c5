//! Encoder builder.
//!
//! Provides a fluent API for configuring and building an [`Encoder`].

use std::sync::Arc;

use http::HeaderMap;
use wrphttp_core::{CompressionLevel, Error, HeaderStyle, Validator};

use crate::encoder::Encoder;
use crate::options::{EncoderConfig, EncoderOption};

/// Builder for creating an [`Encoder`].
///
/// Each call records one step. [`build`](Self::build) applies the defaults
/// (msgpack, no compression, 1000 items per chunk) and then every step in the
/// order it was added, so later steps override earlier ones.
///
/// # Example
///
/// ```ignore
/// use wrphttp::{CompressionLevel, Encoder, HeaderStyle};
///
/// let encoder = Encoder::builder()
///     .as_octet_stream(HeaderStyle::XMidt)
///     .encode_gzip(CompressionLevel::Default)
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct EncoderBuilder {
    steps: Vec<EncoderOption>,
}

impl EncoderBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a caller-constructed step.
    pub fn option(mut self, option: EncoderOption) -> Self {
        self.steps.push(option);
        self
    }

    pub fn as_json(self) -> Self {
        self.option(EncoderOption::as_json())
    }

    pub fn as_msgpack(self) -> Self {
        self.option(EncoderOption::as_msgpack())
    }

    pub fn as_jsonl(self) -> Self {
        self.option(EncoderOption::as_jsonl())
    }

    pub fn as_msgpackl(self) -> Self {
        self.option(EncoderOption::as_msgpackl())
    }

    pub fn as_octet_stream(self, style: HeaderStyle) -> Self {
        self.option(EncoderOption::as_octet_stream(style))
    }

    /// Octet-stream with the style given as a token. Fails at build time if
    /// the token is unknown.
    pub fn as_octet_stream_style(self, style: &str) -> Self {
        self.option(EncoderOption::as_octet_stream_style(style))
    }

    /// Use the media type named by a MIME string. Fails at build time if it
    /// is not supported.
    pub fn as_media_type(self, mime: &str) -> Self {
        self.option(EncoderOption::as_media_type(mime))
    }

    /// Answer in whatever the request with these headers asked for.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let encoder = Encoder::builder()
    ///     .as_negotiated(request.headers())
    ///     .build()?;
    /// let response = encoder.new_response(StatusCode::OK, msgs)?;
    /// ```
    pub fn as_negotiated(self, headers: &HeaderMap) -> Self {
        self.option(EncoderOption::as_negotiated(headers))
    }

    pub fn encode_gzip(self, level: CompressionLevel) -> Self {
        self.option(EncoderOption::encode_gzip(level))
    }

    pub fn encode_deflate(self, level: CompressionLevel) -> Self {
        self.option(EncoderOption::encode_deflate(level))
    }

    pub fn encode_zlib(self, level: CompressionLevel) -> Self {
        self.option(EncoderOption::encode_zlib(level))
    }

    pub fn encode_no_compression(self) -> Self {
        self.option(EncoderOption::encode_no_compression())
    }

    /// Add a validator. Validators accumulate and run in the order added.
    pub fn validator<V: Validator>(self, validator: V) -> Self {
        self.option(EncoderOption::validator(validator))
    }

    /// Items per multipart part for the line formats. 0 means 1000; a
    /// negative value disables chunking.
    pub fn max_items_per_chunk(self, max_items: i64) -> Self {
        self.option(EncoderOption::max_items_per_chunk(max_items))
    }

    pub fn compatibility_mode(self, enabled: bool) -> Self {
        self.option(EncoderOption::compatibility_mode(enabled))
    }

    /// Apply the defaults and every recorded step.
    ///
    /// The first failing step aborts the build with [`Error::Configuration`].
    pub fn build(self) -> Result<Encoder, Error> {
        let mut config = EncoderConfig::default();
        for step in self.steps {
            step.apply(&mut config)
                .map_err(|e| Error::Configuration(Box::new(e)))?;
        }
        tracing::debug!(config = ?config, "built encoder");
        Ok(Encoder::from_config(Arc::new(config)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wrphttp_core::{CompressionEncoding, MediaType, Message, ValidationError};

    #[test]
    fn test_build_defaults() {
        let encoder = EncoderBuilder::new().build().unwrap();
        assert_eq!(encoder.config().media_type(), MediaType::Msgpack);
        assert_eq!(encoder.config().encoding(), CompressionEncoding::Identity);
        assert_eq!(encoder.config().max_items_per_chunk(), Some(1000));
    }

    #[test]
    fn test_build_applies_steps_in_order() {
        let encoder = Encoder::builder()
            .as_msgpackl()
            .encode_gzip(CompressionLevel::Best)
            .max_items_per_chunk(-1)
            .as_json()
            .compatibility_mode(true)
            .build()
            .unwrap();
        let config = encoder.config();
        assert_eq!(config.media_type(), MediaType::Json);
        assert_eq!(config.encoding(), CompressionEncoding::Gzip);
        assert_eq!(config.max_items_per_chunk(), None);
        assert!(config.compatibility_mode());
    }

    #[test]
    fn test_build_fails_on_first_bad_step() {
        let err = Encoder::builder()
            .as_json()
            .as_octet_stream_style("bogus")
            .as_media_type("image/png")
            .build()
            .unwrap_err();
        match err {
            Error::Configuration(inner) => assert!(matches!(*inner, Error::InvalidStyle(_))),
            other => panic!("expected configuration error, got {other:?}"),
        }
    }

    #[test]
    fn test_validators_accumulate() {
        let encoder = Encoder::builder()
            .validator(|_: &Message| -> Result<(), ValidationError> { Ok(()) })
            .validator(|_: &Message| -> Result<(), ValidationError> { Ok(()) })
            .build()
            .unwrap();
        assert_eq!(encoder.config().validators().len(), 2);
    }

    #[test]
    fn test_custom_option() {
        let encoder = Encoder::builder()
            .option(EncoderOption::new(|config| {
                config.set_media_type(MediaType::Jsonl);
                Ok(())
            }))
            .build()
            .unwrap();
        assert_eq!(encoder.config().media_type(), MediaType::Jsonl);
    }
}
