//! Header naming styles for the octet-stream representation.
//!
//! When a message is sent as `application/wrp+octet-stream`, its fields travel
//! as HTTP headers and only the payload is carried in the body. Four historical
//! naming conventions exist for those headers; each logical [`Field`] maps to
//! one name per [`HeaderStyle`] through an explicit [`HeaderKeys`] record.
//!
//! Encoding writes exactly one style. Decoding looks every field up under all
//! of its names, so a reader never needs to know which style the writer used.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue};

use crate::error::Error;
use crate::message::{Message, MessageType, Validator};

/// One of the four header naming conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HeaderStyle {
    /// `X-Xmidt-*` headers.
    XXmidt,
    /// `X-Midt-*` headers.
    XMidt,
    /// `Xmidt-*` headers.
    Xmidt,
    /// Legacy WebPA naming; only the destination field has a distinct name
    /// (`X-Webpa-Device-Name`), every other field uses the `X-Xmidt-*` name.
    #[default]
    XWebpa,
}

impl HeaderStyle {
    /// Every style, in table order.
    pub const ALL: [HeaderStyle; 4] = [
        HeaderStyle::XXmidt,
        HeaderStyle::XMidt,
        HeaderStyle::Xmidt,
        HeaderStyle::XWebpa,
    ];

    /// The `style=` MIME parameter token.
    pub fn as_str(&self) -> &'static str {
        match self {
            HeaderStyle::XXmidt => "x-xmidt",
            HeaderStyle::XMidt => "x-midt",
            HeaderStyle::Xmidt => "xmidt",
            HeaderStyle::XWebpa => "x-webpa",
        }
    }
}

impl fmt::Display for HeaderStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HeaderStyle {
    type Err = Error;

    /// Parse a style token, ignoring ASCII case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        HeaderStyle::ALL
            .into_iter()
            .find(|style| style.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| Error::InvalidStyle(s.to_string()))
    }
}

/// The header names of one logical field, one per style.
///
/// Names are stored lowercase since [`HeaderName`] is case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderKeys {
    pub x_xmidt: &'static str,
    pub x_midt: &'static str,
    pub xmidt: &'static str,
    /// Distinct WebPA name; only the destination field has one.
    pub legacy: Option<&'static str>,
}

impl HeaderKeys {
    /// The header name this field is written under for `style`.
    ///
    /// Fields without a legacy name fall back to the `X-Xmidt` name.
    pub fn name(&self, style: HeaderStyle) -> HeaderName {
        let name = match style {
            HeaderStyle::XXmidt => self.x_xmidt,
            HeaderStyle::XMidt => self.x_midt,
            HeaderStyle::Xmidt => self.xmidt,
            HeaderStyle::XWebpa => self.legacy.unwrap_or(self.x_xmidt),
        };
        HeaderName::from_static(name)
    }

    /// All names with the style each one identifies, in table order.
    pub fn names(&self) -> impl Iterator<Item = (HeaderStyle, &'static str)> {
        [
            (HeaderStyle::XXmidt, Some(self.x_xmidt)),
            (HeaderStyle::XMidt, Some(self.x_midt)),
            (HeaderStyle::Xmidt, Some(self.xmidt)),
            (HeaderStyle::XWebpa, self.legacy),
        ]
        .into_iter()
        .filter_map(|(style, name)| name.map(|n| (style, n)))
    }

    /// First non-empty value found under any of the names.
    pub fn get<'a>(&self, headers: &'a HeaderMap) -> Option<&'a str> {
        self.names()
            .filter_map(|(_, name)| headers.get(name))
            .filter_map(header_str)
            .find(|v| !v.is_empty())
    }

    /// Every value under every name, names in table order.
    pub fn values<'a>(&self, headers: &'a HeaderMap) -> Vec<&'a str> {
        self.names()
            .flat_map(|(_, name)| headers.get_all(name).iter())
            .filter_map(header_str)
            .collect()
    }

    /// Guess the style a sender used from which of the names is present.
    pub fn which_style(&self, headers: &HeaderMap) -> Option<HeaderStyle> {
        self.names()
            .find(|(_, name)| headers.contains_key(*name))
            .map(|(style, _)| style)
    }
}

/// Header values may carry UTF-8 that `HeaderValue::to_str` rejects.
fn header_str(value: &HeaderValue) -> Option<&str> {
    std::str::from_utf8(value.as_bytes()).ok()
}

const fn keys(x_xmidt: &'static str, x_midt: &'static str, xmidt: &'static str) -> HeaderKeys {
    HeaderKeys {
        x_xmidt,
        x_midt,
        xmidt,
        legacy: None,
    }
}

const MESSAGE_TYPE: HeaderKeys = keys(
    "x-xmidt-message-type",
    "x-midt-message-type",
    "xmidt-message-type",
);
const TRANSACTION_UUID: HeaderKeys = keys(
    "x-xmidt-transaction-uuid",
    "x-midt-transaction-uuid",
    "xmidt-transaction-uuid",
);
const STATUS: HeaderKeys = keys("x-xmidt-status", "x-midt-status", "xmidt-status");
const REQUEST_DELIVERY_RESPONSE: HeaderKeys = keys(
    "x-xmidt-request-delivery-response",
    "x-midt-request-delivery-response",
    "xmidt-request-delivery-response",
);
const PATH: HeaderKeys = keys("x-xmidt-path", "x-midt-path", "xmidt-path");
const SOURCE: HeaderKeys = keys("x-xmidt-source", "x-midt-source", "xmidt-source");
const DESTINATION: HeaderKeys = HeaderKeys {
    x_xmidt: "x-xmidt-destination",
    x_midt: "x-midt-destination",
    xmidt: "xmidt-destination",
    legacy: Some("x-webpa-device-name"),
};
const ACCEPT: HeaderKeys = keys("x-xmidt-accept", "x-midt-accept", "xmidt-accept");
const METADATA: HeaderKeys = keys("x-xmidt-metadata", "x-midt-metadata", "xmidt-metadata");
const PARTNER_ID: HeaderKeys = keys(
    "x-xmidt-partner-id",
    "x-midt-partner-id",
    "xmidt-partner-id",
);
const SESSION_ID: HeaderKeys = keys(
    "x-xmidt-session-id",
    "x-midt-session-id",
    "xmidt-session-id",
);
const HEADERS: HeaderKeys = keys("x-xmidt-headers", "x-midt-headers", "xmidt-headers");
const SERVICE_NAME: HeaderKeys = keys(
    "x-xmidt-service-name",
    "x-midt-service-name",
    "xmidt-service-name",
);
const URL: HeaderKeys = keys("x-xmidt-url", "x-midt-url", "xmidt-url");

/// A message field that has an HTTP header projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    MessageType,
    TransactionUuid,
    Status,
    RequestDeliveryResponse,
    Path,
    Source,
    Destination,
    Accept,
    Metadata,
    PartnerIds,
    SessionId,
    Headers,
    ServiceName,
    Url,
}

impl Field {
    pub const ALL: [Field; 14] = [
        Field::MessageType,
        Field::TransactionUuid,
        Field::Status,
        Field::RequestDeliveryResponse,
        Field::Path,
        Field::Source,
        Field::Destination,
        Field::Accept,
        Field::Metadata,
        Field::PartnerIds,
        Field::SessionId,
        Field::Headers,
        Field::ServiceName,
        Field::Url,
    ];

    /// The header names for this field.
    pub fn keys(&self) -> &'static HeaderKeys {
        match self {
            Field::MessageType => &MESSAGE_TYPE,
            Field::TransactionUuid => &TRANSACTION_UUID,
            Field::Status => &STATUS,
            Field::RequestDeliveryResponse => &REQUEST_DELIVERY_RESPONSE,
            Field::Path => &PATH,
            Field::Source => &SOURCE,
            Field::Destination => &DESTINATION,
            Field::Accept => &ACCEPT,
            Field::Metadata => &METADATA,
            Field::PartnerIds => &PARTNER_ID,
            Field::SessionId => &SESSION_ID,
            Field::Headers => &HEADERS,
            Field::ServiceName => &SERVICE_NAME,
            Field::Url => &URL,
        }
    }

    /// Shorthand for `self.keys().name(style)`.
    pub fn header_name(&self, style: HeaderStyle) -> HeaderName {
        self.keys().name(style)
    }
}

/// Project a message onto headers under one style.
///
/// Returns the header set and the payload, which becomes the body. Empty
/// fields are left out; metadata entries with empty values and empty entries
/// of the headers list are skipped.
pub fn to_headers(
    msg: &Message,
    style: HeaderStyle,
    validators: &[Arc<dyn Validator>],
) -> Result<(HeaderMap, Vec<u8>), Error> {
    msg.validate(validators)?;

    let mut out = Projection {
        headers: HeaderMap::new(),
        style,
    };

    out.insert(Field::MessageType, msg.msg_type.friendly_name())?;
    out.insert_int(Field::Status, msg.status)?;
    out.insert_int(Field::RequestDeliveryResponse, msg.request_delivery_response)?;
    out.insert(Field::TransactionUuid, &msg.transaction_id)?;
    out.insert(Field::Path, &msg.path)?;
    out.insert(Field::Source, &msg.source)?;
    out.insert(Field::Destination, &msg.destination)?;
    out.insert(Field::Accept, &msg.accept)?;
    out.insert(Field::SessionId, &msg.session_id)?;
    out.insert(Field::ServiceName, &msg.service_name)?;
    out.insert(Field::Url, &msg.url)?;

    for (key, value) in &msg.metadata {
        if !value.is_empty() {
            out.append(Field::Metadata, &format!("{key}:{value}"))?;
        }
    }

    out.insert(Field::PartnerIds, &msg.partner_ids.join(","))?;

    for value in &msg.headers {
        if !value.is_empty() {
            out.append(Field::Headers, value)?;
        }
    }

    Ok((out.headers, msg.payload.clone()))
}

/// Rebuild a message from headers and a payload.
///
/// Each field is looked up under all of its names, so any style (even a mix)
/// is accepted. Integer headers that fail to parse are ignored.
pub fn from_headers(
    headers: &HeaderMap,
    payload: Vec<u8>,
    validators: &[Arc<dyn Validator>],
) -> Result<Message, Error> {
    let read = |field: Field| {
        field
            .keys()
            .get(headers)
            .map(str::to_string)
            .unwrap_or_default()
    };

    let mut msg = Message {
        msg_type: Field::MessageType
            .keys()
            .get(headers)
            .map(MessageType::from_friendly_name)
            .unwrap_or_default(),
        transaction_id: read(Field::TransactionUuid),
        status: read_int(headers, Field::Status),
        request_delivery_response: read_int(headers, Field::RequestDeliveryResponse),
        path: read(Field::Path),
        source: read(Field::Source),
        destination: read(Field::Destination),
        accept: read(Field::Accept),
        session_id: read(Field::SessionId),
        service_name: read(Field::ServiceName),
        url: read(Field::Url),
        payload,
        ..Default::default()
    };

    msg.partner_ids = Field::PartnerIds
        .keys()
        .values(headers)
        .into_iter()
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect();

    msg.metadata = Field::Metadata
        .keys()
        .values(headers)
        .into_iter()
        .filter_map(|entry| entry.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect::<BTreeMap<_, _>>();

    msg.headers = Field::Headers
        .keys()
        .values(headers)
        .into_iter()
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect();

    msg.validate(validators)?;
    Ok(msg)
}

fn read_int(headers: &HeaderMap, field: Field) -> Option<i64> {
    let raw = field.keys().get(headers)?;
    match raw.trim().parse::<i64>() {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(?field, value = raw, error = %e, "ignoring unparsable integer header");
            None
        }
    }
}

struct Projection {
    headers: HeaderMap,
    style: HeaderStyle,
}

impl Projection {
    fn value(field: Field, value: &str) -> Result<HeaderValue, Error> {
        HeaderValue::from_str(value).map_err(|e| {
            Error::Encode(format!(
                "invalid value for {} header: {e}",
                field.keys().x_xmidt
            ))
        })
    }

    fn insert(&mut self, field: Field, value: &str) -> Result<(), Error> {
        if !value.is_empty() {
            let value = Self::value(field, value)?;
            self.headers.insert(field.header_name(self.style), value);
        }
        Ok(())
    }

    fn insert_int(&mut self, field: Field, value: Option<i64>) -> Result<(), Error> {
        match value {
            Some(v) => self.insert(field, &v.to_string()),
            None => Ok(()),
        }
    }

    fn append(&mut self, field: Field, value: &str) -> Result<(), Error> {
        let value = Self::value(field, value)?;
        self.headers.append(field.header_name(self.style), value);
        Ok(())
    }
}
