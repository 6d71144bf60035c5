//! Content negotiation.
//!
//! Picks the representation a peer wants from its `Accept` header, falling
//! back to the `Content-Type` the peer itself used.

use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, Request};
use wrphttp_core::{Error, Field, HeaderStyle, MediaType, STYLE_PARAM, parse_mime};

/// Representation chosen when only a wildcard matched.
pub const WILDCARD_FALLBACK: MediaType = MediaType::MsgpackL;

/// One entry of an `Accept` header.
#[derive(Debug)]
struct AcceptEntry {
    essence: String,
    style: String,
    q: f64,
}

impl AcceptEntry {
    fn parse(raw: &str) -> Result<Self, Error> {
        let mime = parse_mime(raw)?;
        let q = mime
            .get_param("q")
            .and_then(|q| q.as_str().parse::<f64>().ok())
            .unwrap_or(1.0);
        let style = mime
            .get_param(STYLE_PARAM)
            .map(|s| s.as_str().to_ascii_lowercase())
            .unwrap_or_default();
        Ok(Self {
            essence: mime.essence_str().to_string(),
            style,
            q,
        })
    }

    fn is_wildcard(&self) -> bool {
        self.essence == "*/*" || self.essence == "application/*"
    }
}

/// Select the media type to answer a request with, given its headers.
///
/// With an `Accept` header, the highest-`q` supported entry wins and a bare
/// wildcard falls back to msgpack lines. Without one, the request's own
/// `Content-Type` is echoed; for octet-stream the style is guessed from which
/// header names the request carries.
pub fn negotiate(headers: &HeaderMap) -> Result<MediaType, Error> {
    let accept = headers
        .get_all(ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect::<Vec<_>>()
        .join(",");

    let negotiated = if accept.is_empty() {
        from_content_type(headers)
    } else {
        from_accept(&accept)
    };

    match &negotiated {
        Ok(mt) => tracing::debug!(media_type = %mt, "negotiated media type"),
        Err(e) => tracing::debug!(error = %e, "media type negotiation failed"),
    }
    negotiated
}

/// [`negotiate`] over a request's headers.
pub fn negotiate_request<B>(req: &Request<B>) -> Result<MediaType, Error> {
    negotiate(req.headers())
}

/// The canonical string of the negotiated media type.
pub fn negotiate_media_type<B>(req: &Request<B>) -> Result<String, Error> {
    negotiate_request(req).map(|mt| mt.to_string())
}

fn from_accept(accept: &str) -> Result<MediaType, Error> {
    let mut entries = accept
        .split(',')
        .map(AcceptEntry::parse)
        .collect::<Result<Vec<_>, _>>()?;

    // Stable, so equal q keeps header order.
    entries.sort_by(|a, b| b.q.total_cmp(&a.q));

    let mut wildcard = false;
    for entry in &entries {
        if entry.is_wildcard() {
            wildcard = true;
            continue;
        }
        if let Ok(mt) = MediaType::resolve(&entry.essence, &entry.style) {
            return Ok(mt);
        }
    }

    if wildcard {
        Ok(WILDCARD_FALLBACK)
    } else {
        Err(Error::NoAcceptableType)
    }
}

fn from_content_type(headers: &HeaderMap) -> Result<MediaType, Error> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mt = MediaType::parse(content_type)?;

    if !matches!(mt, MediaType::OctetStream(_)) {
        return Ok(mt);
    }

    // The declared style is not trusted; the header names actually sent are.
    let style = Field::Destination
        .keys()
        .which_style(headers)
        .or_else(|| {
            Field::MessageType
                .keys()
                .which_style(headers)
                .map(|style| match style {
                    HeaderStyle::XXmidt => HeaderStyle::XWebpa,
                    other => other,
                })
        });
    Ok(MediaType::OctetStream(style))
}
