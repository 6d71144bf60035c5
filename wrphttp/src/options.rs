//! Encoder configuration.
//!
//! An [`EncoderConfig`] is produced by applying an ordered list of
//! [`EncoderOption`] steps on top of the defaults. A step may fail, in which
//! case no encoder is built.

use std::sync::Arc;

use http::HeaderMap;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE, HeaderValue};
use wrphttp_core::{CompressionEncoding, CompressionLevel, Error, HeaderStyle, MediaType, Validator};

use crate::negotiate::negotiate;

/// Items per part when chunking is left at its default.
pub const DEFAULT_MAX_ITEMS_PER_CHUNK: usize = 1000;

/// Settings an [`Encoder`](crate::Encoder) runs with.
#[derive(Clone)]
pub struct EncoderConfig {
    pub(crate) media_type: MediaType,
    pub(crate) encoding: CompressionEncoding,
    pub(crate) level: CompressionLevel,
    pub(crate) validators: Vec<Arc<dyn Validator>>,
    pub(crate) max_items_per_chunk: Option<usize>,
    pub(crate) compatibility_mode: bool,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            media_type: MediaType::Msgpack,
            encoding: CompressionEncoding::Identity,
            level: CompressionLevel::Default,
            validators: Vec::new(),
            max_items_per_chunk: Some(DEFAULT_MAX_ITEMS_PER_CHUNK),
            compatibility_mode: false,
        }
    }
}

impl EncoderConfig {
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    /// Header style used for octet-stream, if that is the media type.
    pub fn header_style(&self) -> Option<HeaderStyle> {
        self.media_type.header_style()
    }

    pub fn encoding(&self) -> CompressionEncoding {
        self.encoding
    }

    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Items per multipart part for the line formats; `None` when chunking is off.
    pub fn max_items_per_chunk(&self) -> Option<usize> {
        self.max_items_per_chunk
    }

    pub fn compatibility_mode(&self) -> bool {
        self.compatibility_mode
    }

    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    pub fn set_media_type(&mut self, media_type: MediaType) {
        self.media_type = media_type;
    }

    pub fn set_compression(&mut self, encoding: CompressionEncoding, level: CompressionLevel) {
        self.encoding = encoding;
        self.level = level;
    }

    pub fn add_validator(&mut self, validator: Arc<dyn Validator>) {
        self.validators.push(validator);
    }

    /// Set the chunk size. 0 means the default of 1000; a negative value
    /// disables chunking so every batch is sent as one part.
    pub fn set_max_items_per_chunk(&mut self, max_items: i64) {
        self.max_items_per_chunk = match max_items {
            0 => Some(DEFAULT_MAX_ITEMS_PER_CHUNK),
            n if n < 0 => None,
            n => Some(usize::try_from(n).unwrap_or(usize::MAX)),
        };
    }

    pub fn set_compatibility_mode(&mut self, enabled: bool) {
        self.compatibility_mode = enabled;
    }

    /// `Content-Type` and, unless identity, `Content-Encoding` for one body or part.
    pub(crate) fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(self.media_type.content_type(self.compatibility_mode)),
        );
        if !self.encoding.is_identity() {
            headers.insert(
                CONTENT_ENCODING,
                HeaderValue::from_static(self.encoding.as_str()),
            );
        }
        headers
    }
}

impl std::fmt::Debug for EncoderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderConfig")
            .field("media_type", &self.media_type)
            .field("encoding", &self.encoding)
            .field("level", &self.level)
            .field("validators", &self.validators.len())
            .field("max_items_per_chunk", &self.max_items_per_chunk)
            .field("compatibility_mode", &self.compatibility_mode)
            .finish()
    }
}

type ApplyFn = Box<dyn FnOnce(&mut EncoderConfig) -> Result<(), Error> + Send>;

/// One configuration step.
///
/// Inputs that can be checked up front (MIME strings, style tokens, request
/// headers) are checked when the option is created; a bad input yields an
/// option that fails when applied.
pub struct EncoderOption(ApplyFn);

impl EncoderOption {
    /// A step that may fail.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut EncoderConfig) -> Result<(), Error> + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// A step that always succeeds.
    pub fn infallible<F>(f: F) -> Self
    where
        F: FnOnce(&mut EncoderConfig) + Send + 'static,
    {
        Self::new(move |config| {
            f(config);
            Ok(())
        })
    }

    /// A step that fails with `err`.
    pub fn error(err: Error) -> Self {
        Self::new(move |_| Err(err))
    }

    pub(crate) fn apply(self, config: &mut EncoderConfig) -> Result<(), Error> {
        (self.0)(config)
    }

    fn media_type(media_type: MediaType) -> Self {
        Self::infallible(move |config| config.set_media_type(media_type))
    }

    fn from_result(result: Result<MediaType, Error>) -> Self {
        match result {
            Ok(media_type) => Self::media_type(media_type),
            Err(e) => Self::error(e),
        }
    }

    /// One JSON message per body or part.
    pub fn as_json() -> Self {
        Self::media_type(MediaType::Json)
    }

    /// One msgpack message per body or part. The default.
    pub fn as_msgpack() -> Self {
        Self::media_type(MediaType::Msgpack)
    }

    /// JSON lines, chunked into parts of at most the configured size.
    pub fn as_jsonl() -> Self {
        Self::media_type(MediaType::Jsonl)
    }

    /// Msgpack lines, chunked into parts of at most the configured size.
    pub fn as_msgpackl() -> Self {
        Self::media_type(MediaType::MsgpackL)
    }

    /// Fields as headers under `style`, payload as the body.
    pub fn as_octet_stream(style: HeaderStyle) -> Self {
        Self::media_type(MediaType::OctetStream(Some(style)))
    }

    /// Like [`as_octet_stream`](Self::as_octet_stream), with the style given
    /// as its token (`x-xmidt`, `X-Midt`, ...). An empty token picks `x-webpa`.
    pub fn as_octet_stream_style(style: &str) -> Self {
        if style.trim().is_empty() {
            return Self::as_octet_stream(HeaderStyle::XWebpa);
        }
        Self::from_result(style.parse().map(|s| MediaType::OctetStream(Some(s))))
    }

    /// Any supported MIME string, such as `application/wrp+octet-stream; style=xmidt`.
    pub fn as_media_type(mime: &str) -> Self {
        Self::from_result(MediaType::parse(mime))
    }

    /// Whatever the request with these headers negotiates to.
    pub fn as_negotiated(headers: &HeaderMap) -> Self {
        Self::from_result(negotiate(headers))
    }

    pub fn encode_gzip(level: CompressionLevel) -> Self {
        Self::infallible(move |config| config.set_compression(CompressionEncoding::Gzip, level))
    }

    /// Raw DEFLATE, sent as `Content-Encoding: deflate`.
    pub fn encode_deflate(level: CompressionLevel) -> Self {
        Self::infallible(move |config| config.set_compression(CompressionEncoding::Deflate, level))
    }

    pub fn encode_zlib(level: CompressionLevel) -> Self {
        Self::infallible(move |config| config.set_compression(CompressionEncoding::Zlib, level))
    }

    /// No compression. The default.
    pub fn encode_no_compression() -> Self {
        Self::infallible(|config| {
            config.set_compression(CompressionEncoding::Identity, CompressionLevel::Default)
        })
    }

    /// Run `validator` on every message before it is encoded.
    pub fn validator<V: Validator>(validator: V) -> Self {
        let validator: Arc<dyn Validator> = Arc::new(validator);
        Self::infallible(move |config| config.add_validator(validator))
    }

    /// See [`EncoderConfig::set_max_items_per_chunk`].
    pub fn max_items_per_chunk(max_items: i64) -> Self {
        Self::infallible(move |config| config.set_max_items_per_chunk(max_items))
    }

    /// Leave the `style=` parameter off `Content-Type` for peers that cannot
    /// parse MIME parameters.
    pub fn compatibility_mode(enabled: bool) -> Self {
        Self::infallible(move |config| config.set_compatibility_mode(enabled))
    }
}

impl std::fmt::Debug for EncoderOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncoderOption")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(options: Vec<EncoderOption>) -> Result<EncoderConfig, Error> {
        let mut config = EncoderConfig::default();
        for option in options {
            option.apply(&mut config)?;
        }
        Ok(config)
    }

    #[test]
    fn test_defaults() {
        let config = EncoderConfig::default();
        assert_eq!(config.media_type(), MediaType::Msgpack);
        assert_eq!(config.encoding(), CompressionEncoding::Identity);
        assert_eq!(config.max_items_per_chunk(), Some(1000));
        assert!(!config.compatibility_mode());
        assert!(config.validators().is_empty());
    }

    #[test]
    fn test_later_options_override_earlier() {
        let config = apply(vec![
            EncoderOption::as_json(),
            EncoderOption::encode_gzip(CompressionLevel::Best),
            EncoderOption::as_jsonl(),
            EncoderOption::encode_zlib(CompressionLevel::Fastest),
        ])
        .unwrap();
        assert_eq!(config.media_type(), MediaType::Jsonl);
        assert_eq!(config.encoding(), CompressionEncoding::Zlib);
        assert_eq!(config.level(), CompressionLevel::Fastest);
    }

    #[test]
    fn test_max_items_per_chunk() {
        let mut config = EncoderConfig::default();
        config.set_max_items_per_chunk(0);
        assert_eq!(config.max_items_per_chunk(), Some(1000));
        config.set_max_items_per_chunk(-1);
        assert_eq!(config.max_items_per_chunk(), None);
        config.set_max_items_per_chunk(7);
        assert_eq!(config.max_items_per_chunk(), Some(7));
    }

    #[test]
    fn test_octet_stream_style_tokens() {
        let config = apply(vec![EncoderOption::as_octet_stream_style("X-Midt")]).unwrap();
        assert_eq!(config.header_style(), Some(HeaderStyle::XMidt));

        let config = apply(vec![EncoderOption::as_octet_stream_style("")]).unwrap();
        assert_eq!(config.header_style(), Some(HeaderStyle::XWebpa));

        let err = apply(vec![EncoderOption::as_octet_stream_style("invalid")]).unwrap_err();
        assert!(matches!(err, Error::InvalidStyle(_)));
    }

    #[test]
    fn test_as_media_type() {
        let config =
            apply(vec![EncoderOption::as_media_type("application/wrp+octet-stream; style=xmidt")])
                .unwrap();
        assert_eq!(
            config.media_type(),
            MediaType::OctetStream(Some(HeaderStyle::Xmidt))
        );

        let err = apply(vec![EncoderOption::as_media_type("text/plain")]).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_as_negotiated() {
        let mut headers = HeaderMap::new();
        headers.insert(http::header::ACCEPT, HeaderValue::from_static("*/*"));
        let config = apply(vec![EncoderOption::as_negotiated(&headers)]).unwrap();
        assert_eq!(config.media_type(), MediaType::MsgpackL);

        headers.insert(http::header::ACCEPT, HeaderValue::from_static("image/png"));
        let err = apply(vec![EncoderOption::as_negotiated(&headers)]).unwrap_err();
        assert!(matches!(err, Error::NoAcceptableType));
    }

    #[test]
    fn test_base_headers() {
        let mut config = apply(vec![
            EncoderOption::as_octet_stream(HeaderStyle::XXmidt),
            EncoderOption::encode_deflate(CompressionLevel::Default),
        ])
        .unwrap();
        let headers = config.base_headers();
        assert_eq!(
            headers[CONTENT_TYPE],
            "application/wrp+octet-stream; style=x-xmidt"
        );
        assert_eq!(headers[CONTENT_ENCODING], "deflate");

        config.set_compatibility_mode(true);
        config.set_compression(CompressionEncoding::Identity, CompressionLevel::Default);
        let headers = config.base_headers();
        assert_eq!(headers[CONTENT_TYPE], "application/wrp+octet-stream");
        assert!(headers.get(CONTENT_ENCODING).is_none());
    }
}
