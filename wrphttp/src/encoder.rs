//! Message encoding into HTTP bodies.
//!
//! [`Encoder::to_parts`] decides the layout up front and returns the header
//! set immediately; the body is written by a spawned producer task into a
//! bounded channel read through [`EncodedBody`]. The producer forwards
//! compressed output after every message, so large batches are never held in
//! memory as a whole.
//!
//! Layouts:
//! - one message, or one chunk of a line format: a single unframed body
//! - otherwise: `multipart/mixed`, one message per part (json, msgpack,
//!   octet-stream) or one chunk per part (jsonl, msgpackl), each part
//!   compressed on its own

use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, Method, Request, Response, StatusCode, Uri};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use wrphttp_core::{
    Error, HeaderStyle, MediaType, Message, closing_delimiter, encode_json, encode_msgpack,
    generate_boundary, multipart_content_type, part_header, to_headers, write_jsonl,
    write_msgpackl_header, write_msgpackl_item,
};

use crate::body::EncodedBody;
use crate::builder::EncoderBuilder;
use crate::options::EncoderConfig;

/// Encodes messages into HTTP header sets and streamed bodies.
///
/// Cheap to clone; the configuration is shared and read-only.
#[derive(Debug, Clone)]
pub struct Encoder {
    config: Arc<EncoderConfig>,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::from_config(Arc::new(EncoderConfig::default()))
    }
}

impl Encoder {
    /// Start configuring an encoder.
    pub fn builder() -> EncoderBuilder {
        EncoderBuilder::new()
    }

    pub(crate) fn from_config(config: Arc<EncoderConfig>) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Encode `msgs` into a header set and a body.
    ///
    /// The body is produced on the current Tokio runtime; without one this
    /// fails with [`Error::Encode`]. Errors known before streaming starts (no
    /// messages, a single octet-stream message failing validation) are
    /// returned here; later failures end the body with an error.
    pub fn to_parts(&self, msgs: Vec<Message>) -> Result<(HeaderMap, EncodedBody), Error> {
        let (headers, body, _producer) = self.spawn_parts(msgs)?;
        Ok((headers, body))
    }

    fn spawn_parts(
        &self,
        msgs: Vec<Message>,
    ) -> Result<(HeaderMap, EncodedBody, JoinHandle<()>), Error> {
        if msgs.is_empty() {
            return Err(Error::EmptyInput);
        }
        let runtime =
            Handle::try_current().map_err(|_| Error::Encode("no tokio runtime".into()))?;

        let config = Arc::clone(&self.config);
        let shape = Shape::from(config.media_type);
        let per_part = shape.items_per_part(msgs.len(), config.max_items_per_chunk);
        let parts = msgs.len().div_ceil(per_part);
        let base = config.base_headers();

        let (headers, job) = if parts == 1 {
            match shape {
                Shape::Headers(style) => {
                    let (projected, payload) = to_headers(&msgs[0], style, &config.validators)?;
                    (merge(projected, &base), Job::Payload(payload))
                }
                Shape::Body(format) => (base, Job::Messages(format, msgs)),
            }
        } else {
            let boundary = generate_boundary();
            let mut headers = base.clone();
            let content_type =
                HeaderValue::from_str(&multipart_content_type(&boundary)).map_err(Error::encode)?;
            headers.insert(CONTENT_TYPE, content_type);
            (
                headers,
                Job::Multipart {
                    boundary,
                    base,
                    shape,
                    msgs,
                    per_part,
                },
            )
        };

        tracing::debug!(
            media_type = %config.media_type,
            encoding = config.encoding.as_str(),
            parts,
            multipart = parts > 1,
            "encoding messages"
        );

        let (tx, body) = EncodedBody::channel();
        let producer = runtime.spawn(produce(config, job, tx));
        Ok((headers, body, producer))
    }

    /// Build a request carrying `msgs`.
    pub fn new_request<M, U>(
        &self,
        method: M,
        uri: U,
        msgs: Vec<Message>,
    ) -> Result<Request<EncodedBody>, Error>
    where
        Method: TryFrom<M>,
        <Method as TryFrom<M>>::Error: Into<http::Error>,
        Uri: TryFrom<U>,
        <Uri as TryFrom<U>>::Error: Into<http::Error>,
    {
        let (mut parts, ()) = Request::builder()
            .method(method)
            .uri(uri)
            .body(())
            .map_err(|e| Error::InvalidRequest(e.to_string()))?
            .into_parts();
        let (headers, body) = self.to_parts(msgs)?;
        parts.headers.extend(headers);
        Ok(Request::from_parts(parts, body))
    }

    /// Build a response carrying `msgs`.
    pub fn new_response<S>(&self, status: S, msgs: Vec<Message>) -> Result<Response<EncodedBody>, Error>
    where
        StatusCode: TryFrom<S>,
        <StatusCode as TryFrom<S>>::Error: Into<http::Error>,
    {
        let (mut parts, ()) = Response::builder()
            .status(status)
            .body(())
            .map_err(|e| Error::InvalidRequest(e.to_string()))?
            .into_parts();
        let (headers, body) = self.to_parts(msgs)?;
        parts.headers.extend(headers);
        Ok(Response::from_parts(parts, body))
    }
}

/// Formats whose messages are serialized into the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Json,
    Msgpack,
    Jsonl,
    MsgpackL,
}

/// Where message fields end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Body(BodyFormat),
    Headers(HeaderStyle),
}

impl From<MediaType> for Shape {
    fn from(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Json => Shape::Body(BodyFormat::Json),
            MediaType::Msgpack => Shape::Body(BodyFormat::Msgpack),
            MediaType::Jsonl => Shape::Body(BodyFormat::Jsonl),
            MediaType::MsgpackL => Shape::Body(BodyFormat::MsgpackL),
            MediaType::OctetStream(style) => Shape::Headers(style.unwrap_or_default()),
        }
    }
}

impl Shape {
    /// Messages per body or part. Only the line formats group messages.
    fn items_per_part(&self, total: usize, max_items: Option<usize>) -> usize {
        match self {
            Shape::Body(BodyFormat::Jsonl | BodyFormat::MsgpackL) => {
                max_items.unwrap_or(total).max(1)
            }
            _ => 1,
        }
    }
}

/// Work handed to the producer.
enum Job {
    /// A single octet-stream payload whose headers were already projected.
    Payload(Vec<u8>),
    /// A single body holding every message.
    Messages(BodyFormat, Vec<Message>),
    Multipart {
        boundary: String,
        base: HeaderMap,
        shape: Shape,
        msgs: Vec<Message>,
        per_part: usize,
    },
}

/// What one body or part holds once its headers are settled.
enum Content<'a> {
    Payload(&'a [u8]),
    Messages(BodyFormat, &'a [Message]),
}

/// Why the producer stopped early.
enum Abort {
    /// The body was dropped.
    Closed,
    Failed(Error),
}

impl From<Error> for Abort {
    fn from(err: Error) -> Self {
        Abort::Failed(err)
    }
}

struct Pipe {
    tx: mpsc::Sender<Result<Bytes, Error>>,
}

impl Pipe {
    async fn send(&self, data: Bytes) -> Result<(), Abort> {
        if data.is_empty() {
            return Ok(());
        }
        self.tx.send(Ok(data)).await.map_err(|_| Abort::Closed)
    }
}

async fn produce(config: Arc<EncoderConfig>, job: Job, tx: mpsc::Sender<Result<Bytes, Error>>) {
    let pipe = Pipe { tx };
    match run(&config, &job, &pipe).await {
        Ok(()) => {}
        Err(Abort::Closed) => tracing::debug!("encoded body dropped before it was read"),
        Err(Abort::Failed(err)) => {
            tracing::warn!(error = %err, "encoding aborted");
            let _ = pipe.tx.send(Err(err)).await;
        }
    }
}

async fn run(config: &EncoderConfig, job: &Job, pipe: &Pipe) -> Result<(), Abort> {
    match job {
        Job::Payload(payload) => write_content(config, Content::Payload(payload), pipe).await,
        Job::Messages(format, msgs) => {
            write_content(config, Content::Messages(*format, msgs), pipe).await
        }
        Job::Multipart {
            boundary,
            base,
            shape,
            msgs,
            per_part,
        } => {
            for (index, group) in msgs.chunks(*per_part).enumerate() {
                match *shape {
                    Shape::Headers(style) => {
                        let (projected, payload) =
                            to_headers(&group[0], style, &config.validators)?;
                        let headers = merge(projected, base);
                        pipe.send(part_header(boundary, index == 0, &headers).into())
                            .await?;
                        write_content(config, Content::Payload(&payload), pipe).await?;
                    }
                    Shape::Body(format) => {
                        pipe.send(part_header(boundary, index == 0, base).into())
                            .await?;
                        write_content(config, Content::Messages(format, group), pipe).await?;
                    }
                }
            }
            pipe.send(closing_delimiter(boundary).into()).await
        }
    }
}

/// Write one body or part through a fresh compressor.
async fn write_content(
    config: &EncoderConfig,
    content: Content<'_>,
    pipe: &Pipe,
) -> Result<(), Abort> {
    let mut w = config.encoding.writer(config.level);
    match content {
        Content::Payload(payload) => {
            w.write_all(payload).map_err(Error::encode)?;
        }
        Content::Messages(format, msgs) => {
            if format == BodyFormat::MsgpackL {
                write_msgpackl_header(&mut w, msgs.len())?;
            }
            for msg in msgs {
                match format {
                    BodyFormat::Json => encode_json(&mut w, msg, &config.validators)?,
                    BodyFormat::Msgpack => encode_msgpack(&mut w, msg, &config.validators)?,
                    BodyFormat::Jsonl => write_jsonl(&mut w, msg, &config.validators)?,
                    BodyFormat::MsgpackL => {
                        write_msgpackl_item(&mut w, msg, &config.validators)?
                    }
                }
                pipe.send(w.take_output()).await?;
            }
        }
    }
    let tail = w.finish().map_err(Error::encode)?;
    pipe.send(tail).await
}

/// Projected field headers plus the content headers.
fn merge(mut projected: HeaderMap, base: &HeaderMap) -> HeaderMap {
    for (name, value) in base {
        projected.insert(name.clone(), value.clone());
    }
    projected
}
