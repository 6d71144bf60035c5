//! Message decoding from HTTP bodies.
//!
//! Handles every layout the [`Encoder`](crate::Encoder) produces. A
//! `multipart/mixed` body is split with [`split_parts`] and each part is
//! decoded on its own headers; top-level `Content-Encoding` is ignored for
//! multipart.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use http::{HeaderMap, Request, Response};
use http_body::Body;
use http_body_util::BodyExt;
use wrphttp_core::{
    CompressionEncoding, Error, MediaType, Message, Validator, decode_json, decode_msgpack,
    decompress, from_headers, parse_mime, read_jsonl, read_msgpackl, split_parts,
};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Decodes HTTP requests and responses into messages.
///
/// Validators run on every decoded message; the first failure aborts the
/// whole decode.
#[derive(Clone, Default)]
pub struct Decoder {
    validators: Vec<Arc<dyn Validator>>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a validator. Validators run in the order added.
    pub fn validator<V: Validator>(mut self, validator: V) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Decode a request. `None` fails with [`Error::NilInput`].
    pub async fn decode_request<B>(
        &self,
        req: impl Into<Option<Request<B>>>,
    ) -> Result<Vec<Message>, Error>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let req = req.into().ok_or(Error::NilInput("request"))?;
        let (parts, body) = req.into_parts();
        self.decode_from_parts(&parts.headers, body).await
    }

    /// Decode a response. `None` fails with [`Error::NilInput`].
    pub async fn decode_response<B>(
        &self,
        resp: impl Into<Option<Response<B>>>,
    ) -> Result<Vec<Message>, Error>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let resp = resp.into().ok_or(Error::NilInput("response"))?;
        let (parts, body) = resp.into_parts();
        self.decode_from_parts(&parts.headers, body).await
    }

    /// Decode a body given the headers it arrived with.
    ///
    /// Messages come back in the order they appear in the body. Nothing is
    /// returned if any part fails.
    pub async fn decode_from_parts<B>(
        &self,
        headers: &HeaderMap,
        body: B,
    ) -> Result<Vec<Message>, Error>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<BoxError>,
    {
        let content_type = header_str(headers, CONTENT_TYPE);
        let parsed = parse_mime(content_type)?;

        if parsed.type_() != mime::MULTIPART {
            let data = collect(body).await?;
            return self.decode_part(headers, data);
        }

        let boundary = parsed
            .get_param(mime::BOUNDARY)
            .map(|b| b.as_str().to_string())
            .filter(|b| !b.is_empty())
            .ok_or_else(|| Error::MissingBoundary(content_type.to_string()))?;
        if !parsed.subtype().as_str().eq_ignore_ascii_case("mixed") {
            return Err(Error::UnsupportedMediaType(
                parsed.essence_str().to_string(),
            ));
        }

        let data = collect(body).await?;
        let mut msgs = Vec::new();
        for (index, part) in split_parts(&data, &boundary)?.into_iter().enumerate() {
            tracing::debug!(part = index, bytes = part.body.len(), "decoding multipart part");
            msgs.extend(self.decode_part(&part.headers, part.body)?);
        }
        Ok(msgs)
    }

    /// Decompress and dispatch one body or part on its own headers.
    fn decode_part(&self, headers: &HeaderMap, data: Bytes) -> Result<Vec<Message>, Error> {
        let encoding = match headers.get(CONTENT_ENCODING) {
            None => CompressionEncoding::Identity,
            Some(value) => CompressionEncoding::try_from_header(Some(
                &String::from_utf8_lossy(value.as_bytes()),
            ))?,
        };
        let data = decompress(encoding, data).map_err(Error::decode)?;

        let parsed = parse_mime(header_str(headers, CONTENT_TYPE))?;
        let media_type = MediaType::from_essence(parsed.essence_str())
            .ok_or_else(|| Error::UnsupportedMediaType(parsed.essence_str().to_string()))?;

        tracing::debug!(
            media_type = media_type.essence(),
            encoding = encoding.as_str(),
            bytes = data.len(),
            "decoding body"
        );

        let validators = &self.validators;
        match media_type {
            MediaType::Json => Ok(vec![decode_json(&data, validators)?]),
            MediaType::Msgpack => Ok(vec![decode_msgpack(&data, validators)?]),
            MediaType::OctetStream(_) => Ok(vec![from_headers(
                headers,
                data.to_vec(),
                validators,
            )?]),
            MediaType::Jsonl => read_jsonl(&data, validators),
            MediaType::MsgpackL => read_msgpackl(&data, validators),
        }
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("validators", &self.validators.len())
            .finish()
    }
}

fn header_str(headers: &HeaderMap, name: http::header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

async fn collect<B>(body: B) -> Result<Bytes, Error>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    Ok(body.collect().await.map_err(read_error)?.to_bytes())
}

/// Errors raised by an [`EncodedBody`](crate::EncodedBody) producer keep
/// their kind; anything else is a read failure.
fn read_error<E: Into<BoxError>>(err: E) -> Error {
    match err.into().downcast::<Error>() {
        Ok(err) => *err,
        Err(other) => Error::Decode(format!("reading body: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;
    use http_body_util::Full;
    use wrphttp_core::{
        CompressionLevel, HeaderStyle, MessageType, ValidationError, closing_delimiter, compress,
        encode_json, part_header, to_headers,
    };

    fn full(data: impl Into<Bytes>) -> Full<Bytes> {
        Full::new(data.into())
    }

    fn headers(content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers
    }

    fn event() -> Message {
        Message {
            msg_type: MessageType::SimpleEvent,
            source: "mac:112233445566".into(),
            destination: "event:device-status".into(),
            payload: b"{\"online\":true}".to_vec(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_nil_inputs() {
        let decoder = Decoder::new();
        let err = decoder
            .decode_request(None::<Request<Full<Bytes>>>)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NilInput("request")));

        let err = decoder
            .decode_response(None::<Response<Full<Bytes>>>)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NilInput("response")));
    }

    #[tokio::test]
    async fn test_single_json() {
        let mut body = Vec::new();
        encode_json(&mut body, &event(), &[]).unwrap();
        let msgs = Decoder::new()
            .decode_from_parts(&headers("application/wrp+json"), full(body))
            .await
            .unwrap();
        assert_eq!(msgs, vec![event()]);
    }

    #[tokio::test]
    async fn test_compressed_octet_stream_any_style() {
        for style in HeaderStyle::ALL {
            let (mut h, payload) = to_headers(&event(), style, &[]).unwrap();
            h.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("application/wrp+octet-stream"),
            );
            h.insert(CONTENT_ENCODING, HeaderValue::from_static("deflate"));
            let body = compress(
                CompressionEncoding::Deflate,
                CompressionLevel::Default,
                &payload,
            )
            .unwrap();

            let msgs = Decoder::new().decode_from_parts(&h, full(body)).await.unwrap();
            assert_eq!(msgs, vec![event()], "{style}");
        }
    }

    #[tokio::test]
    async fn test_unsupported_encoding() {
        let mut h = headers("application/wrp+json");
        h.insert(CONTENT_ENCODING, HeaderValue::from_static("br"));
        let err = Decoder::new()
            .decode_from_parts(&h, full("{}"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedEncoding(ref t) if t == "br"));
    }

    #[tokio::test]
    async fn test_unsupported_media_type() {
        let err = Decoder::new()
            .decode_from_parts(&headers("text/plain"), full("hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(_)));
    }

    #[tokio::test]
    async fn test_multipart_requires_boundary_and_mixed() {
        let err = Decoder::new()
            .decode_from_parts(&headers("multipart/mixed"), full(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingBoundary(_)));

        let err = Decoder::new()
            .decode_from_parts(&headers("multipart/form-data; boundary=abc"), full(""))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedMediaType(_)));
    }

    #[tokio::test]
    async fn test_multipart_parts_in_order() {
        let mut body = Vec::new();
        for (n, source) in ["first", "second"].into_iter().enumerate() {
            if n > 0 {
                body.extend_from_slice(b"\r\n");
            }
            body.extend_from_slice(b"--xyz\r\nContent-Type: application/wrp+json\r\n\r\n");
            let msg = Message {
                source: source.into(),
                ..event()
            };
            encode_json(&mut body, &msg, &[]).unwrap();
        }
        body.extend_from_slice(b"\r\n--xyz--\r\n");

        let msgs = Decoder::new()
            .decode_from_parts(&headers("multipart/mixed; boundary=xyz"), full(body))
            .await
            .unwrap();
        let sources: Vec<_> = msgs.iter().map(|m| m.source.as_str()).collect();
        assert_eq!(sources, ["first", "second"]);
    }

    #[tokio::test]
    async fn test_multipart_part_failure_aborts() {
        let body = "--xyz\r\nContent-Type: application/wrp+json\r\n\r\n{}\r\n\
                    --xyz\r\nContent-Type: application/wrp+json\r\n\r\n{broken\r\n\
                    --xyz--\r\n";
        let err = Decoder::new()
            .decode_from_parts(&headers("multipart/mixed; boundary=xyz"), full(body))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[tokio::test]
    async fn test_validator_runs_after_decode() {
        let mut body = Vec::new();
        encode_json(&mut body, &event(), &[]).unwrap();
        let decoder = Decoder::new().validator(|msg: &Message| -> Result<(), ValidationError> {
            if msg.msg_type == MessageType::SimpleEvent {
                Err(ValidationError::new("events not accepted here"))
            } else {
                Ok(())
            }
        });
        let err = decoder
            .decode_from_parts(&headers("application/wrp+json"), full(body))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_multipart_keeps_repeated_part_headers() {
        let msg = Message {
            metadata: (0..40)
                .map(|n| (format!("/k{n}"), format!("v{n}")))
                .collect(),
            headers: vec!["A: 1".into(), "B: 2".into(), "C: 3".into()],
            ..event()
        };
        let (mut part, payload) = to_headers(&msg, HeaderStyle::XXmidt, &[]).unwrap();
        part.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/wrp+octet-stream"),
        );

        let mut body = Vec::new();
        for n in 0..2 {
            body.extend_from_slice(&part_header("xyz", n == 0, &part));
            body.extend_from_slice(&payload);
        }
        body.extend_from_slice(&closing_delimiter("xyz"));

        let msgs = Decoder::new()
            .decode_from_parts(&headers("multipart/mixed; boundary=xyz"), full(body))
            .await
            .unwrap();
        assert_eq!(msgs, vec![msg.clone(), msg]);
    }

    #[tokio::test]
    async fn test_content_type_with_spaced_parameters() {
        let mut body = Vec::new();
        encode_json(&mut body, &event(), &[]).unwrap();
        let msgs = Decoder::new()
            .decode_from_parts(&headers("application/wrp+json ; charset = utf-8"), full(body))
            .await
            .unwrap();
        assert_eq!(msgs, vec![event()]);

        let body = "--xyz\r\nContent-Type: application/wrp+json\r\n\r\n{}\r\n--xyz--\r\n";
        let msgs = Decoder::new()
            .decode_from_parts(&headers("multipart/mixed ; boundary = xyz"), full(body))
            .await
            .unwrap();
        assert_eq!(msgs.len(), 1);
    }

    #[tokio::test]
    async fn test_body_error_keeps_its_kind() {
        let (tx, body) = crate::body::EncodedBody::channel();
        tx.send(Err(Error::Validation(ValidationError::new("rejected"))))
            .await
            .unwrap();
        drop(tx);
        let err = Decoder::new()
            .decode_from_parts(&headers("application/wrp+json"), body)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_decode_request() {
        let mut body = Vec::new();
        encode_json(&mut body, &event(), &[]).unwrap();
        let req = Request::post("/api/v2/device")
            .header(CONTENT_TYPE, "application/wrp+json")
            .body(full(body))
            .unwrap();
        let msgs = Decoder::new().decode_request(req).await.unwrap();
        assert_eq!(msgs, vec![event()]);
    }
}
