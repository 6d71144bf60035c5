//! Compression configuration types.
//!
//! This module provides:
//! - [`CompressionEncoding`]: supported `Content-Encoding` tokens
//! - [`CompressionLevel`]: compression quality settings

use crate::codec::CompressWriter;
use crate::error::Error;

/// Supported compression encodings.
///
/// Use [`CompressionEncoding::writer()`] for the streaming compressor and
/// [`crate::decompress`] for the inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionEncoding {
    #[default]
    Identity,
    /// RFC 1952 gzip.
    Gzip,
    /// Raw RFC 1951 DEFLATE stream, no container.
    Deflate,
    /// RFC 1950 zlib container.
    Zlib,
}

impl CompressionEncoding {
    /// Parse from a Content-Encoding header value.
    /// Returns None for unsupported encodings.
    pub fn from_header(value: Option<&str>) -> Option<Self> {
        match value.map(str::trim) {
            None | Some("identity") | Some("") => Some(Self::Identity),
            Some("gzip") => Some(Self::Gzip),
            Some("deflate") => Some(Self::Deflate),
            Some("zlib") => Some(Self::Zlib),
            _ => None,
        }
    }

    /// Like [`from_header`](Self::from_header), but unsupported tokens are an error.
    pub fn try_from_header(value: Option<&str>) -> Result<Self, Error> {
        Self::from_header(value)
            .ok_or_else(|| Error::UnsupportedEncoding(value.unwrap_or_default().to_string()))
    }

    /// Get the header value string for this encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
            Self::Deflate => "deflate",
            Self::Zlib => "zlib",
        }
    }

    /// Returns true if this encoding is identity (no compression).
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Create a streaming compressor that buffers its output in memory.
    pub fn writer(&self, level: CompressionLevel) -> CompressWriter {
        CompressWriter::new(*self, level)
    }
}

/// Compression level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Fastest compression (lowest ratio).
    Fastest,
    /// Best compression (highest ratio, slowest).
    Best,
    /// Default compression level.
    #[default]
    Default,
    /// Precise compression level, 0-9.
    Precise(u32),
}

impl CompressionLevel {
    /// Create a compression level with a precise value.
    pub fn precise(level: u32) -> Self {
        CompressionLevel::Precise(level)
    }

    /// Convert to a flate2 level.
    ///
    /// - `Fastest` → 1
    /// - `Best` → 9
    /// - `Default` → 6
    /// - `Precise(n)` → n clamped to 0-9
    pub(crate) fn to_flate2(self) -> flate2::Compression {
        let level = match self {
            CompressionLevel::Fastest => 1,
            CompressionLevel::Best => 9,
            CompressionLevel::Default => 6,
            CompressionLevel::Precise(n) => n.clamp(0, 9),
        };
        flate2::Compression::new(level)
    }
}
