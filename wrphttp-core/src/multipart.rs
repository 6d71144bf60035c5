//! `multipart/mixed` framing.
//!
//! The encoder writes the body incrementally:
//!
//! ```text
//! --<boundary>\r\n
//! Content-Type: application/wrp+msgpack\r\n
//! \r\n
//! <part body>\r\n
//! --<boundary>\r\n
//! ...
//! <part body>\r\n
//! --<boundary>--\r\n
//! ```
//!
//! [`part_header`] emits everything up to the part body, including the line
//! break that ends the previous part. [`split_parts`] reads a complete body
//! back, keeping every value of a repeated part header.

use bytes::Bytes;
use http::HeaderMap;
use http::header::{HeaderName, HeaderValue};

use crate::error::Error;

/// Length in bytes of the random boundary before hex encoding.
const BOUNDARY_BYTES: usize = 30;

/// A fresh random boundary: 30 random bytes, hex encoded.
pub fn generate_boundary() -> String {
    let raw = rand::random::<[u8; BOUNDARY_BYTES]>();
    let mut out = String::with_capacity(BOUNDARY_BYTES * 2);
    for b in raw {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

/// The top-level `Content-Type` for a body framed with `boundary`.
pub fn multipart_content_type(boundary: &str) -> String {
    format!("multipart/mixed; boundary={boundary}")
}

/// Delimiter line and header block opening a part.
pub fn part_header(boundary: &str, first: bool, headers: &HeaderMap) -> Vec<u8> {
    let mut out = Vec::with_capacity(64 + boundary.len());
    if !first {
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"--");
    out.extend_from_slice(boundary.as_bytes());
    out.extend_from_slice(b"\r\n");
    for (name, value) in headers {
        out.extend_from_slice(name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"\r\n");
    out
}

/// Closing delimiter after the last part.
pub fn closing_delimiter(boundary: &str) -> Vec<u8> {
    format!("\r\n--{boundary}--\r\n").into_bytes()
}

/// One part of a `multipart/mixed` body.
#[derive(Debug, Clone)]
pub struct Part {
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Split a complete `multipart/mixed` body into its parts, in order.
///
/// The preamble and epilogue are ignored. Repeated header names within a
/// part are all kept, in the order they appear.
pub fn split_parts(body: &Bytes, boundary: &str) -> Result<Vec<Part>, Error> {
    let mut delimiter = Vec::with_capacity(boundary.len() + 4);
    delimiter.extend_from_slice(b"\r\n--");
    delimiter.extend_from_slice(boundary.as_bytes());
    // Without the leading line break, for a body that opens on the delimiter.
    let bare = &delimiter[2..];

    let mut pos = if body.starts_with(bare) && is_delimiter_end(&body[bare.len()..]) {
        bare.len()
    } else {
        let at = find_delimiter(body, 0, &delimiter).ok_or_else(|| unterminated(boundary))?;
        at + delimiter.len()
    };

    let mut parts = Vec::new();
    loop {
        let rest = &body[pos..];
        if rest.starts_with(b"--") {
            return Ok(parts);
        }
        pos += line_end(rest).ok_or_else(|| unterminated(boundary))?;

        let (consumed, headers) = parse_part_headers(&body[pos..])?;
        let start = pos + consumed;
        let end = find_delimiter(body, start, &delimiter).ok_or_else(|| unterminated(boundary))?;
        parts.push(Part {
            headers,
            body: body.slice(start..end),
        });
        pos = end + delimiter.len();
    }
}

/// A delimiter must be followed by `--`, padding or a line break.
fn is_delimiter_end(rest: &[u8]) -> bool {
    rest.starts_with(b"--") || matches!(rest.first(), None | Some(b' ' | b'\t' | b'\r' | b'\n'))
}

fn find_delimiter(body: &[u8], from: usize, delimiter: &[u8]) -> Option<usize> {
    let mut from = from;
    while from + delimiter.len() <= body.len() {
        let at = from + body[from..]
            .windows(delimiter.len())
            .position(|w| w == delimiter)?;
        if is_delimiter_end(&body[at + delimiter.len()..]) {
            return Some(at);
        }
        from = at + 1;
    }
    None
}

/// Bytes up to and including the line break after a delimiter, skipping
/// transport padding.
fn line_end(rest: &[u8]) -> Option<usize> {
    let padding = rest.iter().take_while(|b| matches!(b, b' ' | b'\t')).count();
    match &rest[padding..] {
        [b'\r', b'\n', ..] => Some(padding + 2),
        [b'\n', ..] => Some(padding + 1),
        _ => None,
    }
}

fn parse_part_headers(data: &[u8]) -> Result<(usize, HeaderMap), Error> {
    let mut capacity = 32;
    loop {
        let mut slots = vec![httparse::EMPTY_HEADER; capacity];
        match httparse::parse_headers(data, &mut slots) {
            Ok(httparse::Status::Complete((consumed, parsed))) => {
                let mut headers = HeaderMap::with_capacity(parsed.len());
                for header in parsed {
                    let name =
                        HeaderName::from_bytes(header.name.as_bytes()).map_err(Error::decode)?;
                    let value = HeaderValue::from_bytes(header.value).map_err(Error::decode)?;
                    headers.append(name, value);
                }
                return Ok((consumed, headers));
            }
            Ok(httparse::Status::Partial) => {
                return Err(Error::Decode("multipart part headers are incomplete".into()));
            }
            Err(httparse::Error::TooManyHeaders) => capacity *= 2,
            Err(e) => return Err(Error::Decode(format!("multipart part headers: {e}"))),
        }
    }
}

fn unterminated(boundary: &str) -> Error {
    Error::Decode(format!("multipart body is missing the delimiter for boundary {boundary:?}"))
}
