//! The WRP message data model.
//!
//! This module provides:
//! - [`Message`]: the protocol unit carried over HTTP
//! - [`MessageType`]: the message kind, with numeric wire value and friendly name
//! - [`Validator`]: the hook run on every message before encode and after decode

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// The kind of a WRP message.
///
/// Serialized as its integer value; the friendly name is what travels in
/// the message-type header of the octet-stream format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MessageType {
    #[default]
    Invalid,
    Authorization,
    SimpleRequestResponse,
    SimpleEvent,
    Create,
    Retrieve,
    Update,
    Delete,
    ServiceRegistration,
    ServiceAlive,
    Unknown,
}

impl MessageType {
    /// Numeric wire value.
    pub fn as_u8(&self) -> u8 {
        match self {
            Self::Invalid => 0,
            Self::Authorization => 2,
            Self::SimpleRequestResponse => 3,
            Self::SimpleEvent => 4,
            Self::Create => 5,
            Self::Retrieve => 6,
            Self::Update => 7,
            Self::Delete => 8,
            Self::ServiceRegistration => 9,
            Self::ServiceAlive => 10,
            Self::Unknown => 11,
        }
    }

    /// Map a numeric wire value back to a message type.
    ///
    /// 0 and 1 are both invalid; values past the known range are `Unknown`.
    pub fn from_u64(value: u64) -> Self {
        match value {
            0 | 1 => Self::Invalid,
            2 => Self::Authorization,
            3 => Self::SimpleRequestResponse,
            4 => Self::SimpleEvent,
            5 => Self::Create,
            6 => Self::Retrieve,
            7 => Self::Update,
            8 => Self::Delete,
            9 => Self::ServiceRegistration,
            10 => Self::ServiceAlive,
            _ => Self::Unknown,
        }
    }

    /// Human-friendly name used in HTTP headers.
    pub fn friendly_name(&self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Authorization => "Auth",
            Self::SimpleRequestResponse => "SimpleRequestResponse",
            Self::SimpleEvent => "SimpleEvent",
            Self::Create => "Create",
            Self::Retrieve => "Retrieve",
            Self::Update => "Update",
            Self::Delete => "Delete",
            Self::ServiceRegistration => "ServiceRegistration",
            Self::ServiceAlive => "ServiceAlive",
            Self::Unknown => "Unknown",
        }
    }

    /// Parse a friendly name (case-insensitive). Unrecognized names map to `Unknown`.
    pub fn from_friendly_name(name: &str) -> Self {
        let name = name.trim();
        [
            Self::Invalid,
            Self::Authorization,
            Self::SimpleRequestResponse,
            Self::SimpleEvent,
            Self::Create,
            Self::Retrieve,
            Self::Update,
            Self::Delete,
            Self::ServiceRegistration,
            Self::ServiceAlive,
        ]
        .into_iter()
        .find(|t| t.friendly_name().eq_ignore_ascii_case(name))
        .unwrap_or_else(|| {
            if name.eq_ignore_ascii_case("event") {
                Self::SimpleEvent
            } else {
                Self::Unknown
            }
        })
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.friendly_name())
    }
}

impl Serialize for MessageType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.as_u8())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MessageTypeVisitor;

        impl Visitor<'_> for MessageTypeVisitor {
            type Value = MessageType;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a message type integer or name")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<MessageType, E> {
                Ok(MessageType::from_u64(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<MessageType, E> {
                u64::try_from(v)
                    .map(MessageType::from_u64)
                    .map_err(|_| E::invalid_value(de::Unexpected::Signed(v), &self))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MessageType, E> {
                Ok(MessageType::from_friendly_name(v))
            }
        }

        deserializer.deserialize_any(MessageTypeVisitor)
    }
}

/// A WRP message.
///
/// Field names follow the msgpack map keys used on the wire. Empty fields are
/// left out of the encoded form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub msg_type: MessageType,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,

    #[serde(rename = "dest", skip_serializing_if = "String::is_empty")]
    pub destination: String,

    #[serde(rename = "transaction_uuid", skip_serializing_if = "String::is_empty")]
    pub transaction_id: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub accept: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<i64>,

    #[serde(rename = "rdr", skip_serializing_if = "Option::is_none")]
    pub request_delivery_response: Option<i64>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub partner_ids: Vec<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<String>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,

    #[serde(with = "payload_bytes", skip_serializing_if = "Vec::is_empty")]
    pub payload: Vec<u8>,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub session_id: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_name: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
}

impl Message {
    /// Create an empty message of the given type.
    pub fn new(msg_type: MessageType) -> Self {
        Self {
            msg_type,
            ..Default::default()
        }
    }

    /// Run every validator against this message, stopping at the first failure.
    pub fn validate(&self, validators: &[Arc<dyn Validator>]) -> Result<(), ValidationError> {
        validators.iter().try_for_each(|v| v.validate(self))
    }
}

/// Hook that checks a message before it is encoded or after it is decoded.
///
/// Closures of the shape `Fn(&Message) -> Result<(), ValidationError>` implement
/// this trait directly.
///
/// # Example
///
/// ```
/// use wrphttp_core::{Message, ValidationError, Validator};
///
/// let require_source = |msg: &Message| {
///     if msg.source.is_empty() {
///         Err(ValidationError::new("source is required"))
///     } else {
///         Ok(())
///     }
/// };
///
/// assert!(require_source.validate(&Message::default()).is_err());
/// ```
pub trait Validator: Send + Sync + 'static {
    /// Check a message.
    fn validate(&self, msg: &Message) -> Result<(), ValidationError>;
}

impl<F> Validator for F
where
    F: Fn(&Message) -> Result<(), ValidationError> + Send + Sync + 'static,
{
    fn validate(&self, msg: &Message) -> Result<(), ValidationError> {
        self(msg)
    }
}

/// Payload bytes: raw binary for msgpack, base64 text for JSON.
mod payload_bytes {
    use std::fmt;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::{self, SeqAccess, Visitor};
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&STANDARD.encode(bytes))
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        struct PayloadVisitor;

        impl<'de> Visitor<'de> for PayloadVisitor {
            type Value = Vec<u8>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a byte string or base64 text")
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Vec<u8>, E> {
                Ok(v.to_vec())
            }

            fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> Result<Vec<u8>, E> {
                Ok(v)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Vec<u8>, E> {
                STANDARD.decode(v).map_err(E::custom)
            }

            fn visit_unit<E: de::Error>(self) -> Result<Vec<u8>, E> {
                Ok(Vec::new())
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Vec<u8>, A::Error> {
                let mut out = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(b) = seq.next_element::<u8>()? {
                    out.push(b);
                }
                Ok(out)
            }
        }

        deserializer.deserialize_any(PayloadVisitor)
    }
}
