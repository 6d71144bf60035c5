//! Media type registry.
//!
//! The five wire representations and the four octet-stream header styles:
//!
//! ```text
//! application/wrp+json
//! application/wrp+msgpack
//! application/wrp+octet-stream[; style={x-xmidt|x-midt|xmidt|x-webpa}]
//! application/wrp+jsonl
//! application/wrp+msgpackl
//! ```

use std::fmt;
use std::str::FromStr;

use mime::Mime;

use crate::error::Error;
use crate::header_style::HeaderStyle;

pub const MEDIA_TYPE_JSON: &str = "application/wrp+json";
pub const MEDIA_TYPE_MSGPACK: &str = "application/wrp+msgpack";
pub const MEDIA_TYPE_OCTET_STREAM: &str = "application/wrp+octet-stream";
pub const MEDIA_TYPE_JSONL: &str = "application/wrp+jsonl";
pub const MEDIA_TYPE_MSGPACKL: &str = "application/wrp+msgpackl";

pub const MEDIA_TYPE_OCTET_STREAM_X_XMIDT_STYLE: &str =
    "application/wrp+octet-stream; style=x-xmidt";
pub const MEDIA_TYPE_OCTET_STREAM_X_MIDT_STYLE: &str = "application/wrp+octet-stream; style=x-midt";
pub const MEDIA_TYPE_OCTET_STREAM_XMIDT_STYLE: &str = "application/wrp+octet-stream; style=xmidt";
pub const MEDIA_TYPE_OCTET_STREAM_WEBPA_STYLE: &str = "application/wrp+octet-stream; style=x-webpa";

/// MIME parameter naming the octet-stream header style.
pub const STYLE_PARAM: &str = "style";

/// A supported wire representation.
///
/// Only the octet-stream representation carries a header style; `None` is the
/// bare `application/wrp+octet-stream` type, which encoders write with the
/// [`HeaderStyle::XWebpa`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// A single message as JSON.
    Json,
    /// A single message as a msgpack map.
    Msgpack,
    /// Message fields in headers, payload in the body.
    OctetStream(Option<HeaderStyle>),
    /// One JSON message per line.
    Jsonl,
    /// A msgpack array of msgpack-encoded messages.
    MsgpackL,
}

impl MediaType {
    /// Every supported media type: five base types plus four octet-stream styles.
    pub const ALL: [MediaType; 9] = [
        MediaType::Json,
        MediaType::Msgpack,
        MediaType::OctetStream(None),
        MediaType::Jsonl,
        MediaType::MsgpackL,
        MediaType::OctetStream(Some(HeaderStyle::XXmidt)),
        MediaType::OctetStream(Some(HeaderStyle::XMidt)),
        MediaType::OctetStream(Some(HeaderStyle::Xmidt)),
        MediaType::OctetStream(Some(HeaderStyle::XWebpa)),
    ];

    /// Look up a base type (`type/subtype` without parameters).
    ///
    /// The octet-stream type comes back without a style.
    pub fn from_essence(essence: &str) -> Option<Self> {
        match essence {
            MEDIA_TYPE_JSON => Some(MediaType::Json),
            MEDIA_TYPE_MSGPACK => Some(MediaType::Msgpack),
            MEDIA_TYPE_OCTET_STREAM => Some(MediaType::OctetStream(None)),
            MEDIA_TYPE_JSONL => Some(MediaType::Jsonl),
            MEDIA_TYPE_MSGPACKL => Some(MediaType::MsgpackL),
            _ => None,
        }
    }

    /// Build a media type from a base type and a style token.
    ///
    /// The style only matters for octet-stream; an empty token yields the
    /// bare octet-stream type.
    pub fn resolve(base: &str, style: &str) -> Result<Self, Error> {
        match Self::from_essence(base) {
            None => Err(Error::UnsupportedMediaType(base.to_string())),
            Some(MediaType::OctetStream(_)) if !style.trim().is_empty() => {
                Ok(MediaType::OctetStream(Some(style.parse()?)))
            }
            Some(mt) => Ok(mt),
        }
    }

    /// Parse a MIME string such as `application/wrp+octet-stream; style=xmidt`.
    pub fn parse(s: &str) -> Result<Self, Error> {
        let mime = parse_mime(s)?;
        let style = mime
            .get_param(STYLE_PARAM)
            .map(|v| v.as_str().to_string())
            .unwrap_or_default();
        Self::resolve(mime.essence_str(), &style)
    }

    /// The base type, without parameters.
    pub fn essence(&self) -> &'static str {
        match self {
            MediaType::Json => MEDIA_TYPE_JSON,
            MediaType::Msgpack => MEDIA_TYPE_MSGPACK,
            MediaType::OctetStream(_) => MEDIA_TYPE_OCTET_STREAM,
            MediaType::Jsonl => MEDIA_TYPE_JSONL,
            MediaType::MsgpackL => MEDIA_TYPE_MSGPACKL,
        }
    }

    /// The canonical string, including the style parameter when present.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::OctetStream(Some(HeaderStyle::XXmidt)) => {
                MEDIA_TYPE_OCTET_STREAM_X_XMIDT_STYLE
            }
            MediaType::OctetStream(Some(HeaderStyle::XMidt)) => MEDIA_TYPE_OCTET_STREAM_X_MIDT_STYLE,
            MediaType::OctetStream(Some(HeaderStyle::Xmidt)) => MEDIA_TYPE_OCTET_STREAM_XMIDT_STYLE,
            MediaType::OctetStream(Some(HeaderStyle::XWebpa)) => {
                MEDIA_TYPE_OCTET_STREAM_WEBPA_STYLE
            }
            other => other.essence(),
        }
    }

    /// The `Content-Type` value to send.
    ///
    /// In compatibility mode the style parameter is left off for peers that
    /// cannot parse MIME parameters.
    pub fn content_type(&self, compatibility: bool) -> &'static str {
        if compatibility {
            self.essence()
        } else {
            self.as_str()
        }
    }

    /// The header style an encoder uses for this type, if it is octet-stream.
    pub fn header_style(&self) -> Option<HeaderStyle> {
        match self {
            MediaType::OctetStream(style) => Some(style.unwrap_or_default()),
            _ => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Every supported canonical media type string, for capability advertisement.
///
/// The order is not significant.
pub fn all_media_types() -> Vec<&'static str> {
    MediaType::ALL.iter().map(MediaType::as_str).collect()
}

/// Parse MIME syntax, mapping failures to [`Error::MalformedMediaType`].
///
/// Optional whitespace around `;` and `=` is accepted.
pub fn parse_mime(s: &str) -> Result<Mime, Error> {
    tighten_params(s)
        .parse::<Mime>()
        .map_err(|e| Error::malformed(s, e))
}

/// Drop whitespace next to `;` and `=` outside quoted strings.
fn tighten_params(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending = String::new();
    let mut after_separator = false;
    let mut quoted = false;
    let mut escaped = false;

    for c in s.trim().chars() {
        if quoted {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                quoted = false;
            }
            continue;
        }
        match c {
            ' ' | '\t' => pending.push(c),
            ';' | '=' => {
                pending.clear();
                out.push(c);
                after_separator = true;
            }
            _ => {
                if !after_separator {
                    out.push_str(&pending);
                }
                pending.clear();
                after_separator = false;
                quoted = c == '"';
                out.push(c);
            }
        }
    }
    out
}
