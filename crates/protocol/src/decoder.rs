//! Decoder for the streaming query result wire format.
//!
//! A result body is a direct concatenation of JSON arrays, each a
//! `[tag, payload]` pair:
//!
//! ```text
//! ["init",{"tick":1,...}]["node",[[["inet:fqdn","x.com"]],{...}]]["fini",{...}]
//! ```
//!
//! There is no enclosing array, no delimiter, and no guaranteed whitespace.
//! Values are read one at a time with a streaming JSON reader that reports how
//! many bytes each value consumed.
//!
//! Unrecognised tags are skipped so that new frame kinds added by the service
//! do not abort an otherwise valid stream. Any value that is not valid JSON
//! fails the whole decode.

use serde::de::{DeserializeOwned, Error as _};
use serde_json::{Map, Value};
use tracing::{trace, warn};

use crate::errors::MalformedResponse;
use crate::types::{DecodedStream, Frame, NodeFrame, TAG_FINI, TAG_INIT, TAG_NODE, TAG_PRINT};

// ---------------------------------------------------------------------------
// Payload decoding
// ---------------------------------------------------------------------------

/// How strictly frame payloads are matched against their expected shape.
///
/// Missing and `null` fields take their zero value in both modes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PayloadMode {
    /// A field of the wrong type decodes as its zero value; the rest of the
    /// record is kept.
    #[default]
    Lenient,
    /// A field of the wrong type fails the decode.
    Strict,
}

/// Decodes one frame payload into `T`, filling absent fields with defaults.
///
/// A `null` payload (including one missing from the wire array) yields
/// `T::default()`. Inside an object payload a `null` field reads as absent.
/// In lenient mode each field that fails to decode falls back to its own
/// default, so one bad field never costs its siblings.
///
/// # Errors
///
/// In [`PayloadMode::Strict`], returns the parse error when `payload` has the
/// wrong shape for `T`. Never fails in [`PayloadMode::Lenient`].
pub fn decode_payload<T>(payload: Value, mode: PayloadMode) -> Result<T, serde_json::Error>
where
    T: DeserializeOwned + Default,
{
    let fields = match payload {
        Value::Null => return Ok(T::default()),
        Value::Object(fields) => fields,
        other => return T::deserialize(other).or_else(|err| mismatch(err, mode)),
    };

    let record = Value::Object(fields.into_iter().filter(|(_, v)| !v.is_null()).collect());
    match T::deserialize(&record) {
        Ok(decoded) => Ok(decoded),
        Err(err) if mode == PayloadMode::Strict => Err(err),
        Err(_) => {
            let Value::Object(fields) = record else {
                return Ok(T::default());
            };
            let kept = keep_decodable_fields::<T>(fields);
            T::deserialize(Value::Object(kept)).or_else(|err| mismatch(err, mode))
        }
    }
}

/// Drops every field of `fields` that does not decode on its own as part of `T`.
fn keep_decodable_fields<T: DeserializeOwned>(fields: Map<String, Value>) -> Map<String, Value> {
    let mut kept = Map::new();
    for (key, value) in fields {
        let mut single = Map::new();
        single.insert(key.clone(), value);
        let single = Value::Object(single);
        match T::deserialize(&single) {
            Ok(_) => {
                if let Value::Object(field) = single {
                    kept.extend(field);
                }
            }
            Err(err) => warn!(
                field = %key,
                error = %err,
                payload_type = std::any::type_name::<T>(),
                "payload field has unexpected type; using its default"
            ),
        }
    }
    kept
}

fn mismatch<T: Default>(err: serde_json::Error, mode: PayloadMode) -> Result<T, serde_json::Error> {
    match mode {
        PayloadMode::Strict => Err(err),
        PayloadMode::Lenient => {
            warn!(
                error = %err,
                payload_type = std::any::type_name::<T>(),
                "payload has unexpected shape; using defaults"
            );
            Ok(T::default())
        }
    }
}

/// Classifies one stream value by its tag.
///
/// Returns `Ok(None)` for tags this decoder does not recognise.
fn classify(value: Value, mode: PayloadMode) -> Result<Option<Frame>, serde_json::Error> {
    let Value::Array(items) = value else {
        return Err(serde_json::Error::custom(
            "stream value is not a [tag, payload] array",
        ));
    };
    let mut items = items.into_iter();
    let tag = match items.next() {
        Some(Value::String(tag)) => tag,
        _ => {
            return Err(serde_json::Error::custom(
                "stream value does not start with a string tag",
            ))
        }
    };
    let payload = items.next().unwrap_or(Value::Null);

    let frame = match tag.as_str() {
        TAG_INIT => Frame::Init(decode_payload(payload, mode)?),
        TAG_NODE => Frame::Node(decode_node(payload, mode)?),
        TAG_FINI => Frame::Fini(decode_payload(payload, mode)?),
        TAG_PRINT => Frame::Print(decode_payload(payload, mode)?),
        other => {
            trace!(tag = other, "skipping unrecognised frame");
            return Ok(None);
        }
    };
    Ok(Some(frame))
}

/// Decodes a `[pairs, info]` node payload.
fn decode_node(payload: Value, mode: PayloadMode) -> Result<NodeFrame, serde_json::Error> {
    let parts = match payload {
        Value::Array(parts) => parts,
        Value::Null => return Ok(NodeFrame::default()),
        other => {
            let err = serde_json::Error::custom(format!(
                "node payload is not a [pairs, info] array: {other}"
            ));
            return mismatch(err, mode);
        }
    };
    let mut parts = parts.into_iter();
    let pairs = decode_pairs(parts.next().unwrap_or(Value::Null), mode)?;
    let info = decode_payload(parts.next().unwrap_or(Value::Null), mode)?;
    Ok(NodeFrame { pairs, info })
}

/// Decodes the identity pairs of a node.
///
/// Each pair keeps its first two string elements. Anything else in a pair is
/// dropped with a warning, and a pair left with fewer than two strings is
/// dropped entirely.
fn decode_pairs(
    value: Value,
    mode: PayloadMode,
) -> Result<Vec<(String, String)>, serde_json::Error> {
    let entries = match value {
        Value::Array(entries) => entries,
        Value::Null => return Ok(Vec::new()),
        other => {
            let err =
                serde_json::Error::custom(format!("node pairs are not an array: {other}"));
            return mismatch(err, mode);
        }
    };

    let pairs = entries.into_iter().filter_map(decode_pair).collect();
    Ok(pairs)
}

fn decode_pair(entry: Value) -> Option<(String, String)> {
    let items = match entry {
        Value::Array(items) => items,
        other => {
            warn!(entry = %other, "node pair is not an array; dropping it");
            return None;
        }
    };
    let elements = items.len();
    let mut strings = items.into_iter().filter_map(|item| match item {
        Value::String(s) => Some(s),
        _ => None,
    });
    let pair = (strings.next(), strings.next());
    let dropped = elements - usize::from(pair.0.is_some()) - usize::from(pair.1.is_some());
    if dropped > 0 {
        warn!(elements, dropped, "node pair has elements other than two strings; dropping them");
    }
    match pair {
        (Some(path), Some(value)) => Some((path, value)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Incremental decoder
// ---------------------------------------------------------------------------

/// Incremental result-stream decoder.
///
/// Bytes may be pushed in arbitrary chunks; every frame completed by a chunk
/// is returned from that [`push`](Self::push). Only the unconsumed tail of a
/// partially received value is retained between calls.
///
/// Incoming bytes are tracked by a structural scan (nesting depth and string
/// state), and the buffer is parsed only once the scan shows a top-level value
/// has closed. Each byte is therefore scanned and parsed a bounded number of
/// times however finely the stream is chunked.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    mode: PayloadMode,
    pending: Vec<u8>,
    consumed: usize,
    scan: Scan,
}

/// Structural state of the bytes in `pending` scanned so far.
#[derive(Debug, Default)]
struct Scan {
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
    /// A top-level value may have completed; the buffer needs parsing.
    ready: bool,
}

impl Scan {
    fn advance(&mut self, bytes: &[u8]) {
        for &byte in &bytes[self.scanned..] {
            if self.in_string {
                match byte {
                    _ if self.escaped => self.escaped = false,
                    b'\\' => self.escaped = true,
                    b'"' => {
                        self.in_string = false;
                        self.ready |= self.depth == 0;
                    }
                    _ => {}
                }
                continue;
            }
            match byte {
                b'"' => self.in_string = true,
                b'[' | b'{' => self.depth += 1,
                b']' | b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    self.ready |= self.depth == 0;
                }
                // A bare scalar at the top level; let the parser judge it.
                _ if self.depth == 0 && !byte.is_ascii_whitespace() => self.ready = true,
                _ => {}
            }
        }
        self.scanned = bytes.len();
    }
}

impl FrameDecoder {
    /// Creates a lenient decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a decoder with the given payload mode.
    pub fn with_mode(mode: PayloadMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Total bytes consumed by completed values so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Feeds `chunk` to the decoder and returns the frames it completed.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedResponse`] with the absolute stream offset of the
    /// first value that is not valid JSON or has no string tag (or, in strict
    /// mode, whose payload has the wrong shape). An invalid value is reported
    /// by the push that closes it, or by [`finish`](Self::finish). The decoder
    /// must not be used after an error.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Frame>, MalformedResponse> {
        self.pending.extend_from_slice(chunk);
        self.scan.advance(&self.pending);
        if !self.scan.ready {
            return Ok(Vec::new());
        }

        let mode = self.mode;
        let base = self.consumed;
        let mut frames = Vec::new();
        let mut values = serde_json::Deserializer::from_slice(&self.pending).into_iter::<Value>();

        let settled = loop {
            let start = values.byte_offset();
            match values.next() {
                None => break values.byte_offset(),
                Some(Ok(value)) => {
                    let frame = classify(value, mode)
                        .map_err(|err| MalformedResponse::frame(base + start, err))?;
                    frames.extend(frame);
                }
                // The value continues in a later chunk.
                Some(Err(err)) if err.is_eof() => break start,
                Some(Err(err)) => return Err(MalformedResponse::frame(base + start, err)),
            }
        };
        drop(values);

        self.pending.drain(..settled);
        self.consumed += settled;
        self.scan = Scan::default();
        self.scan.advance(&self.pending);
        Ok(frames)
    }

    /// Signals end of input.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedResponse`] if a partially received value remains.
    pub fn finish(self) -> Result<(), MalformedResponse> {
        if self.pending.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }
        match serde_json::from_slice::<Value>(&self.pending) {
            Ok(_) => Ok(()),
            Err(err) => Err(MalformedResponse::frame(self.consumed, err)),
        }
    }
}

// ---------------------------------------------------------------------------
// Whole-buffer entry points
// ---------------------------------------------------------------------------

/// Decodes a complete result body into its ordered frame sequence.
///
/// # Errors
///
/// Returns [`MalformedResponse`] if any value in the body is not valid JSON.
pub fn decode_frames(bytes: &[u8]) -> Result<Vec<Frame>, MalformedResponse> {
    decode_frames_with(bytes, PayloadMode::Lenient)
}

/// Like [`decode_frames`], with an explicit payload mode.
///
/// # Errors
///
/// See [`FrameDecoder::push`].
pub fn decode_frames_with(
    bytes: &[u8],
    mode: PayloadMode,
) -> Result<Vec<Frame>, MalformedResponse> {
    let mut decoder = FrameDecoder::with_mode(mode);
    let frames = decoder.push(bytes)?;
    decoder.finish()?;
    Ok(frames)
}

/// Decodes a complete result body into per-kind frame sequences.
///
/// Empty input yields an empty [`DecodedStream`].
///
/// # Errors
///
/// Returns [`MalformedResponse`] if any value in the body is not valid JSON.
pub fn decode_stream(bytes: &[u8]) -> Result<DecodedStream, MalformedResponse> {
    decode_frames(bytes).map(DecodedStream::from_frames)
}

#[cfg(test)]
#[path = "decoder_tests.rs"]
mod tests;
