//! Message serialization for the body-carrying formats.
//!
//! Bulk formats hold exactly one message. The line formats hold many:
//! JSON lines puts one message per `\n`-terminated line, and msgpack lines is
//! a msgpack array header followed by each message as a msgpack `bin` item
//! whose bytes are the message's own msgpack encoding.
//!
//! Every encode runs the validators before writing and every decode runs them
//! after reading.

use std::io::Write;
use std::sync::Arc;

use crate::error::Error;
use crate::message::{Message, Validator};

/// Write one message as JSON, without a trailing newline.
pub fn encode_json<W: Write>(
    w: &mut W,
    msg: &Message,
    validators: &[Arc<dyn Validator>],
) -> Result<(), Error> {
    msg.validate(validators)?;
    serde_json::to_writer(w, msg).map_err(Error::encode)
}

/// Write one message as a msgpack map keyed by field name.
pub fn encode_msgpack<W: Write>(
    w: &mut W,
    msg: &Message,
    validators: &[Arc<dyn Validator>],
) -> Result<(), Error> {
    msg.validate(validators)?;
    rmp_serde::encode::write_named(w, msg).map_err(Error::encode)
}

pub fn decode_json(data: &[u8], validators: &[Arc<dyn Validator>]) -> Result<Message, Error> {
    let msg: Message = serde_json::from_slice(data).map_err(Error::decode)?;
    msg.validate(validators)?;
    Ok(msg)
}

pub fn decode_msgpack(data: &[u8], validators: &[Arc<dyn Validator>]) -> Result<Message, Error> {
    let msg: Message = rmp_serde::from_slice(data).map_err(Error::decode)?;
    msg.validate(validators)?;
    Ok(msg)
}

/// Write one JSON line: the message followed by `\n`.
pub fn write_jsonl<W: Write>(
    w: &mut W,
    msg: &Message,
    validators: &[Arc<dyn Validator>],
) -> Result<(), Error> {
    encode_json(w, msg, validators)?;
    w.write_all(b"\n").map_err(Error::encode)
}

/// Decode every non-empty line. A malformed line fails the whole body.
pub fn read_jsonl(data: &[u8], validators: &[Arc<dyn Validator>]) -> Result<Vec<Message>, Error> {
    data.split(|b| *b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(|line| decode_json(line, validators))
        .collect()
}

/// Write the array header announcing `len` items.
pub fn write_msgpackl_header<W: Write>(w: &mut W, len: usize) -> Result<(), Error> {
    let len = u32::try_from(len)
        .map_err(|_| Error::Encode(format!("too many messages for one array: {len}")))?;
    rmp::encode::write_array_len(w, len)
        .map(|_| ())
        .map_err(Error::encode)
}

/// Write one array item: the msgpack encoding of `msg`, wrapped as `bin`.
pub fn write_msgpackl_item<W: Write>(
    w: &mut W,
    msg: &Message,
    validators: &[Arc<dyn Validator>],
) -> Result<(), Error> {
    let mut item = Vec::new();
    encode_msgpack(&mut item, msg, validators)?;
    rmp::encode::write_bin(w, &item).map_err(Error::encode)
}

/// Read an array header and then exactly that many `bin` items.
pub fn read_msgpackl(
    data: &[u8],
    validators: &[Arc<dyn Validator>],
) -> Result<Vec<Message>, Error> {
    let mut rd = data;
    let count = rmp::decode::read_array_len(&mut rd).map_err(Error::decode)?;

    let mut msgs = Vec::with_capacity(count.min(1024) as usize);
    for index in 0..count {
        let len = rmp::decode::read_bin_len(&mut rd).map_err(Error::decode)? as usize;
        if rd.len() < len {
            return Err(Error::Decode(format!(
                "item {index} truncated: want {len} bytes, have {}",
                rd.len()
            )));
        }
        let (item, rest) = rd.split_at(len);
        msgs.push(decode_msgpack(item, validators)?);
        rd = rest;
    }
    Ok(msgs)
}
