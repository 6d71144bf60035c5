//! Streaming compression and one-shot decompression.
//!
//! [`CompressWriter`] wraps a flate2 encoder around an in-memory sink. The
//! encoder keeps appending compressed output to the sink; callers drain it
//! with [`CompressWriter::take_output`] whenever they want to forward what has
//! been produced so far, and call [`CompressWriter::finish`] once to flush the
//! trailer.

use std::io::{self, Read, Write};

use bytes::Bytes;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, GzEncoder, ZlibEncoder};

use crate::compression::{CompressionEncoding, CompressionLevel};

/// A compressing writer over an in-memory buffer.
pub enum CompressWriter {
    Identity(Vec<u8>),
    Gzip(GzEncoder<Vec<u8>>),
    Deflate(DeflateEncoder<Vec<u8>>),
    Zlib(ZlibEncoder<Vec<u8>>),
}

impl CompressWriter {
    /// Create a writer for the given encoding and level.
    pub fn new(encoding: CompressionEncoding, level: CompressionLevel) -> Self {
        let level = level.to_flate2();
        match encoding {
            CompressionEncoding::Identity => CompressWriter::Identity(Vec::new()),
            CompressionEncoding::Gzip => CompressWriter::Gzip(GzEncoder::new(Vec::new(), level)),
            CompressionEncoding::Deflate => {
                CompressWriter::Deflate(DeflateEncoder::new(Vec::new(), level))
            }
            CompressionEncoding::Zlib => CompressWriter::Zlib(ZlibEncoder::new(Vec::new(), level)),
        }
    }

    fn sink(&mut self) -> &mut Vec<u8> {
        match self {
            CompressWriter::Identity(buf) => buf,
            CompressWriter::Gzip(enc) => enc.get_mut(),
            CompressWriter::Deflate(enc) => enc.get_mut(),
            CompressWriter::Zlib(enc) => enc.get_mut(),
        }
    }

    /// Drain whatever compressed output is ready.
    ///
    /// May be empty: compressors hold input back until they have a block.
    pub fn take_output(&mut self) -> Bytes {
        Bytes::from(std::mem::take(self.sink()))
    }

    /// Finish the stream and return the remaining output.
    pub fn finish(self) -> io::Result<Bytes> {
        let rest = match self {
            CompressWriter::Identity(buf) => buf,
            CompressWriter::Gzip(enc) => enc.finish()?,
            CompressWriter::Deflate(enc) => enc.finish()?,
            CompressWriter::Zlib(enc) => enc.finish()?,
        };
        Ok(Bytes::from(rest))
    }
}

impl Write for CompressWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            CompressWriter::Identity(sink) => sink.write(buf),
            CompressWriter::Gzip(enc) => enc.write(buf),
            CompressWriter::Deflate(enc) => enc.write(buf),
            CompressWriter::Zlib(enc) => enc.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            CompressWriter::Identity(_) => Ok(()),
            CompressWriter::Gzip(enc) => enc.flush(),
            CompressWriter::Deflate(enc) => enc.flush(),
            CompressWriter::Zlib(enc) => enc.flush(),
        }
    }
}

impl std::fmt::Debug for CompressWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CompressWriter::Identity(_) => "identity",
            CompressWriter::Gzip(_) => "gzip",
            CompressWriter::Deflate(_) => "deflate",
            CompressWriter::Zlib(_) => "zlib",
        };
        f.debug_tuple("CompressWriter").field(&name).finish()
    }
}

/// Compress a whole buffer in one call.
pub fn compress(
    encoding: CompressionEncoding,
    level: CompressionLevel,
    data: &[u8],
) -> io::Result<Bytes> {
    if encoding.is_identity() {
        return Ok(Bytes::copy_from_slice(data));
    }
    let mut writer = CompressWriter::new(encoding, level);
    writer.write_all(data)?;
    let head = writer.take_output();
    let tail = writer.finish()?;
    let mut out = Vec::with_capacity(head.len() + tail.len());
    out.extend_from_slice(&head);
    out.extend_from_slice(&tail);
    Ok(Bytes::from(out))
}

/// Decompress a whole buffer.
///
/// Identity is a zero-copy passthrough.
pub fn decompress(encoding: CompressionEncoding, data: Bytes) -> io::Result<Bytes> {
    let mut out = Vec::new();
    match encoding {
        CompressionEncoding::Identity => return Ok(data),
        CompressionEncoding::Gzip => GzDecoder::new(&data[..]).read_to_end(&mut out)?,
        CompressionEncoding::Deflate => DeflateDecoder::new(&data[..]).read_to_end(&mut out)?,
        CompressionEncoding::Zlib => ZlibDecoder::new(&data[..]).read_to_end(&mut out)?,
    };
    Ok(Bytes::from(out))
}
