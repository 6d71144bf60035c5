//! End-to-end encode/decode tests over every representation.

use std::collections::BTreeMap;

use bytes::Bytes;
use futures::stream;
use http::header::{ACCEPT, CONTENT_ENCODING, CONTENT_TYPE};
use http::{HeaderMap, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use wrphttp::{
    CompressionEncoding, CompressionLevel, Decoder, Encoder, EncoderOption, Error, HeaderStyle,
    MediaType, Message, MessageType, ValidationError, decompress, read_jsonl, read_msgpackl,
};

const ENCODINGS: [CompressionEncoding; 4] = [
    CompressionEncoding::Identity,
    CompressionEncoding::Gzip,
    CompressionEncoding::Deflate,
    CompressionEncoding::Zlib,
];

/// A message with every field set, with several metadata and header entries.
fn full_message(n: usize) -> Message {
    Message {
        msg_type: MessageType::SimpleRequestResponse,
        source: "dns:talaria.example.com".into(),
        destination: format!("mac:11223344556{n}/config"),
        transaction_id: format!("c07ee5e1-70be-444c-a156-097c767ad8a{n}"),
        accept: "application/json".into(),
        status: Some(200),
        request_delivery_response: Some(1),
        partner_ids: vec!["comcast".into(), "sky".into()],
        headers: vec!["X-Trace-Id: abc123".into(), "X-Region: eu-west".into()],
        metadata: BTreeMap::from([
            ("/boot-time".to_string(), "1700000000".to_string()),
            ("/hw-model".to_string(), "TG1682".to_string()),
            ("/trust".to_string(), "1000".to_string()),
        ]),
        path: "/api/v2/device/config".into(),
        payload: format!("{{\"setting\":{n}}}").into_bytes(),
        session_id: format!("session-{n}"),
        service_name: "config".into(),
        url: format!("mac:11223344556{n}/config"),
    }
}

fn with_compression(encoding: CompressionEncoding) -> EncoderOption {
    EncoderOption::infallible(move |config| {
        config.set_compression(encoding, CompressionLevel::Default)
    })
}

async fn collect(headers: &HeaderMap, body: wrphttp::EncodedBody) -> (HeaderMap, Bytes) {
    (headers.clone(), body.collect().await.unwrap().to_bytes())
}

fn boundary_of(headers: &HeaderMap) -> Option<String> {
    headers[CONTENT_TYPE]
        .to_str()
        .unwrap()
        .strip_prefix("multipart/mixed; boundary=")
        .map(str::to_string)
}

/// Split an encoded multipart body into (part headers, part body) pairs.
async fn split_parts(boundary: String, body: Bytes) -> Vec<(HeaderMap, Bytes)> {
    let stream = stream::once(async move { Ok::<_, std::io::Error>(body) });
    let mut multipart = multer::Multipart::new(stream, boundary);
    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let headers = field.headers().clone();
        parts.push((headers, field.bytes().await.unwrap()));
    }
    parts
}

#[tokio::test]
async fn test_round_trip_every_format_and_compression() {
    for media_type in MediaType::ALL {
        for encoding in ENCODINGS {
            for count in [1, 3] {
                let encoder = Encoder::builder()
                    .as_media_type(media_type.as_str())
                    .option(with_compression(encoding))
                    .build()
                    .unwrap();
                let msgs: Vec<_> = (0..count).map(full_message).collect();

                let (headers, body) = encoder.to_parts(msgs.clone()).unwrap();
                let decoded = Decoder::new()
                    .decode_from_parts(&headers, body)
                    .await
                    .unwrap();
                assert_eq!(decoded, msgs, "{media_type} {encoding:?} x{count}");
            }
        }
    }
}

#[tokio::test]
async fn test_single_octet_stream_keeps_repeated_headers() {
    let mut msg = full_message(1);
    msg.metadata.insert("/trust".into(), "1000".into());
    msg.metadata.insert("/hw-model".into(), "TG1682".into());
    msg.headers.push("X-Other: value".into());

    for style in HeaderStyle::ALL {
        let encoder = Encoder::builder().as_octet_stream(style).build().unwrap();
        let (headers, body) = encoder.to_parts(vec![msg.clone()]).unwrap();
        let decoded = Decoder::new()
            .decode_from_parts(&headers, body)
            .await
            .unwrap();
        assert_eq!(decoded, vec![msg.clone()], "{style}");
    }
}

#[tokio::test]
async fn test_multipart_octet_stream_keeps_repeated_headers() {
    let msgs: Vec<_> = (0..3)
        .map(|n| {
            let mut msg = full_message(n);
            msg.metadata
                .extend((0..40).map(|k| (format!("/k{k}"), format!("v{k}-{n}"))));
            msg.headers.extend((0..5).map(|k| format!("X-Extra-{k}: {n}")));
            msg
        })
        .collect();

    for style in HeaderStyle::ALL {
        let encoder = Encoder::builder()
            .as_octet_stream(style)
            .encode_gzip(CompressionLevel::Fastest)
            .build()
            .unwrap();
        let (headers, body) = encoder.to_parts(msgs.clone()).unwrap();
        assert!(boundary_of(&headers).is_some());

        let decoded = Decoder::new()
            .decode_from_parts(&headers, body)
            .await
            .unwrap();
        assert_eq!(decoded, msgs, "{style}");
    }
}

#[tokio::test]
async fn test_style_independent_decode() {
    for style in HeaderStyle::ALL {
        let encoder = Encoder::builder()
            .as_octet_stream(style)
            .compatibility_mode(true)
            .build()
            .unwrap();
        let (headers, body) = encoder.to_parts(vec![full_message(2)]).unwrap();
        assert_eq!(headers[CONTENT_TYPE], "application/wrp+octet-stream");

        let decoded = Decoder::new()
            .decode_from_parts(&headers, body)
            .await
            .unwrap();
        assert_eq!(decoded, vec![full_message(2)], "{style}");
    }
}

#[tokio::test]
async fn test_chunking_part_counts() {
    let cases: [(usize, i64, Option<Vec<usize>>); 6] = [
        (7, 3, Some(vec![3, 3, 1])),
        (6, 3, Some(vec![3, 3])),
        (3, 3, None),
        (2, 3, None),
        (7, -1, None),
        (5, 1, Some(vec![1, 1, 1, 1, 1])),
    ];

    for media_type in [MediaType::Jsonl, MediaType::MsgpackL] {
        for (count, max_items, want) in &cases {
            let encoder = Encoder::builder()
                .as_media_type(media_type.as_str())
                .encode_gzip(CompressionLevel::Fastest)
                .max_items_per_chunk(*max_items)
                .build()
                .unwrap();
            let msgs: Vec<_> = (0..*count).map(full_message).collect();
            let (headers, body) = encoder.to_parts(msgs.clone()).unwrap();
            let (headers, bytes) = collect(&headers, body).await;

            let Some(want) = want else {
                assert!(boundary_of(&headers).is_none(), "{media_type} n={count}");
                assert_eq!(headers[CONTENT_TYPE], media_type.as_str());
                continue;
            };

            let boundary = boundary_of(&headers).unwrap();
            let parts = split_parts(boundary, bytes.clone()).await;
            let sizes: Vec<_> = parts
                .iter()
                .map(|(_, data)| {
                    let raw = decompress(CompressionEncoding::Gzip, data.clone()).unwrap();
                    match media_type {
                        MediaType::Jsonl => read_jsonl(&raw, &[]).unwrap().len(),
                        _ => read_msgpackl(&raw, &[]).unwrap().len(),
                    }
                })
                .collect();
            assert_eq!(&sizes, want, "{media_type} n={count} c={max_items}");

            let decoded = Decoder::new()
                .decode_from_parts(&headers, Full::new(bytes))
                .await
                .unwrap();
            assert_eq!(decoded, msgs);
        }
    }
}

#[tokio::test]
async fn test_multipart_parts_carry_content_headers() {
    let encoder = Encoder::builder()
        .as_msgpack()
        .encode_deflate(CompressionLevel::Best)
        .build()
        .unwrap();
    let msgs: Vec<_> = (0..4).map(full_message).collect();
    let (headers, body) = encoder.to_parts(msgs).unwrap();
    let (headers, bytes) = collect(&headers, body).await;
    assert_eq!(headers[CONTENT_ENCODING], "deflate");

    let parts = split_parts(boundary_of(&headers).unwrap(), bytes).await;
    assert_eq!(parts.len(), 4);
    for (part_headers, _) in &parts {
        assert_eq!(part_headers[CONTENT_TYPE], "application/wrp+msgpack");
        assert_eq!(part_headers[CONTENT_ENCODING], "deflate");
    }
}

#[tokio::test]
async fn test_multipart_octet_stream_part_headers() {
    let encoder = Encoder::builder()
        .as_octet_stream(HeaderStyle::Xmidt)
        .build()
        .unwrap();
    let (headers, body) = encoder
        .to_parts(vec![full_message(1), full_message(2)])
        .unwrap();
    let (headers, bytes) = collect(&headers, body).await;

    let parts = split_parts(boundary_of(&headers).unwrap(), bytes).await;
    assert_eq!(parts.len(), 2);
    for (n, (part_headers, data)) in parts.iter().enumerate() {
        assert_eq!(
            part_headers[CONTENT_TYPE],
            "application/wrp+octet-stream; style=xmidt"
        );
        assert_eq!(
            part_headers["xmidt-transaction-uuid"],
            full_message(n + 1).transaction_id.as_str()
        );
        assert_eq!(data, &Bytes::from(full_message(n + 1).payload));
    }
}

#[tokio::test]
async fn test_multipart_validation_failure_reaches_decoder() {
    let encoder = Encoder::builder()
        .as_octet_stream(HeaderStyle::XXmidt)
        .validator(|msg: &Message| -> Result<(), ValidationError> {
            if msg.session_id == "session-2" {
                Err(ValidationError::new("session closed"))
            } else {
                Ok(())
            }
        })
        .build()
        .unwrap();
    let (headers, body) = encoder.to_parts((0..4).map(full_message).collect()).unwrap();
    let err = Decoder::new()
        .decode_from_parts(&headers, body)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "{err:?}");
}

#[tokio::test]
async fn test_negotiated_response_round_trip() {
    let incoming = Request::post("/api/v2/device")
        .header(ACCEPT, "application/wrp+msgpack;q=0.5, application/wrp+jsonl;q=0.9")
        .body(Full::new(Bytes::new()))
        .unwrap();

    let encoder = Encoder::builder()
        .as_negotiated(incoming.headers())
        .encode_gzip(CompressionLevel::Default)
        .build()
        .unwrap();
    assert_eq!(encoder.config().media_type(), MediaType::Jsonl);

    let replies: Vec<_> = (0..3).map(full_message).collect();
    let response = encoder.new_response(StatusCode::OK, replies.clone()).unwrap();
    assert_eq!(response.headers()[CONTENT_TYPE], "application/wrp+jsonl");

    let decoded = Decoder::new().decode_response(response).await.unwrap();
    assert_eq!(decoded, replies);
}

#[tokio::test]
async fn test_request_round_trip_with_validators() {
    let encoder = Encoder::builder()
        .as_octet_stream_style("X-Webpa")
        .encode_zlib(CompressionLevel::Default)
        .build()
        .unwrap();
    let req = encoder
        .new_request("POST", "http://example.com/api/v2/device/send", vec![full_message(4)])
        .unwrap();
    assert!(req.headers().contains_key("x-webpa-device-name"));

    let decoder = Decoder::new().validator(|msg: &Message| -> Result<(), ValidationError> {
        if msg.destination.is_empty() {
            Err(ValidationError::new("destination required"))
        } else {
            Ok(())
        }
    });
    let decoded = decoder.decode_request(req).await.unwrap();
    assert_eq!(decoded, vec![full_message(4)]);
}
