//! Frame and node types carried by a streaming query result.
//!
//! A result stream is a sequence of `[tag, payload]` values. Each recognised
//! tag maps to one of the frame types here; [`Frame`] is the tagged union and
//! [`DecodedStream`] the per-kind partition of a whole stream.
//!
//! Node properties, tags and auxiliary mappings are open-ended on the wire and
//! are therefore held as [`serde_json::Value`] rather than fixed structs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Frame tags
// ---------------------------------------------------------------------------

/// Wire tag of an [`InitFrame`].
pub const TAG_INIT: &str = "init";
/// Wire tag of a [`NodeFrame`].
pub const TAG_NODE: &str = "node";
/// Wire tag of a [`FiniFrame`].
pub const TAG_FINI: &str = "fini";
/// Wire tag of a [`PrintFrame`].
pub const TAG_PRINT: &str = "print";

// ---------------------------------------------------------------------------
// init / fini
// ---------------------------------------------------------------------------

/// Emitted once when the service starts executing a query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitFrame {
    /// Start tick in milliseconds.
    pub tick: i64,
    /// Query text as received by the service.
    pub text: String,
    /// Absolute start tick.
    pub abstick: i64,
    /// Hash of the query text.
    pub hash: String,
    /// Task identifier executing the query.
    pub task: String,
}

/// Emitted once when the query completes; carries timing and result count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiniFrame {
    /// End tick in milliseconds.
    pub tock: i64,
    /// Absolute end tick.
    pub abstock: i64,
    /// Elapsed time in milliseconds.
    pub took: i64,
    /// Number of nodes the query produced.
    pub count: u64,
}

/// Message emitted by the query itself, e.g. through `$lib.print`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintFrame {
    /// The printed text.
    pub mesg: String,
}

// ---------------------------------------------------------------------------
// node
// ---------------------------------------------------------------------------

/// A graph node returned by a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFrame {
    /// Property-path/value tuples describing the node's identity packing.
    pub pairs: Vec<(String, String)>,
    /// The node's properties, tags and auxiliary data.
    pub info: NodeInfo,
}

impl NodeFrame {
    /// Encodes the node as its `["node", [pairs, info]]` wire array.
    pub fn to_wire(&self) -> Value {
        let pairs: Vec<Value> = self
            .pairs
            .iter()
            .map(|(path, value)| Value::from(vec![path.as_str(), value.as_str()]))
            .collect();
        // NodeInfo is maps and strings only; serialization cannot fail.
        let info = serde_json::to_value(&self.info).unwrap_or(Value::Null);
        Value::from(vec![
            Value::from(TAG_NODE),
            Value::from(vec![Value::from(pairs), info]),
        ])
    }
}

/// The record half of a node payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeInfo {
    /// Node identifier (hex digest).
    pub iden: String,
    /// Tags applied to the node. Values are usually strings or intervals.
    pub tags: BTreeMap<String, Value>,
    /// Node properties, including the reserved keys read by the accessors.
    pub props: BTreeMap<String, Value>,
    /// Properties attached to tags.
    #[serde(rename = "tagprops")]
    pub tag_props: BTreeMap<String, Value>,
    /// Arbitrary node data.
    #[serde(rename = "nodedata")]
    pub node_data: BTreeMap<String, Value>,
    /// Pipeline path variables in effect when the node was yielded.
    pub path: BTreeMap<String, Value>,
}

impl NodeInfo {
    /// Reserved property holding the creation time (epoch milliseconds).
    pub const PROP_CREATED: &'static str = ".created";
    /// Reserved property holding the first/last seen interval.
    pub const PROP_SEEN: &'static str = ".seen";

    /// Returns the node's creation time, if present and representable.
    pub fn created(&self) -> Option<Timestamp> {
        self.props
            .get(Self::PROP_CREATED)
            .and_then(Value::as_i64)
            .and_then(Timestamp::from_millis)
    }

    /// Returns the `.seen` timestamps, skipping entries that are not integers.
    pub fn seen(&self) -> Vec<Timestamp> {
        self.props
            .get(Self::PROP_SEEN)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_i64)
                    .filter_map(Timestamp::from_millis)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Returns the `name` property.
    pub fn name(&self) -> Option<&str> {
        self.str_prop("name")
    }

    /// Returns the `type` property.
    pub fn kind(&self) -> Option<&str> {
        self.str_prop("type")
    }

    /// Returns the `desc` property.
    pub fn desc(&self) -> Option<&str> {
        self.str_prop("desc")
    }

    /// Returns the `leaker` property.
    pub fn leaker(&self) -> Option<&str> {
        self.str_prop("leaker")
    }

    fn str_prop(&self, key: &str) -> Option<&str> {
        self.props.get(key).and_then(Value::as_str)
    }
}

// ---------------------------------------------------------------------------
// Frame union
// ---------------------------------------------------------------------------

/// One decoded unit of a result stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Query start.
    Init(InitFrame),
    /// One result node.
    Node(NodeFrame),
    /// Query end.
    Fini(FiniFrame),
    /// Output printed by the query.
    Print(PrintFrame),
}

impl Frame {
    /// Returns the wire tag for this frame.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Init(_) => TAG_INIT,
            Self::Node(_) => TAG_NODE,
            Self::Fini(_) => TAG_FINI,
            Self::Print(_) => TAG_PRINT,
        }
    }

    /// Encodes the frame as its two-element wire array.
    pub fn to_wire(&self) -> Value {
        let payload = match self {
            Self::Node(node) => return node.to_wire(),
            Self::Init(init) => serde_json::to_value(init),
            Self::Fini(fini) => serde_json::to_value(fini),
            Self::Print(print) => serde_json::to_value(print),
        };
        // These payloads are plain integer/string records.
        Value::from(vec![Value::from(self.tag()), payload.unwrap_or(Value::Null)])
    }
}

// ---------------------------------------------------------------------------
// Partitioned stream
// ---------------------------------------------------------------------------

/// A result stream partitioned by frame kind.
///
/// Order within each partition follows stream order; order across partitions
/// is not retained (use [`crate::decode_frames`] when it matters).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedStream {
    /// `init` frames in stream order.
    pub inits: Vec<InitFrame>,
    /// `node` frames in stream order.
    pub nodes: Vec<NodeFrame>,
    /// `fini` frames in stream order.
    pub finis: Vec<FiniFrame>,
    /// `print` frames in stream order.
    pub prints: Vec<PrintFrame>,
}

impl DecodedStream {
    /// Partitions an ordered frame sequence.
    pub fn from_frames(frames: impl IntoIterator<Item = Frame>) -> Self {
        let mut stream = Self::default();
        stream.extend(frames);
        stream
    }

    /// Appends one frame to its partition.
    pub fn push(&mut self, frame: Frame) {
        match frame {
            Frame::Init(init) => self.inits.push(init),
            Frame::Node(node) => self.nodes.push(node),
            Frame::Fini(fini) => self.finis.push(fini),
            Frame::Print(print) => self.prints.push(print),
        }
    }

    /// Returns `true` if no frames were decoded.
    pub fn is_empty(&self) -> bool {
        self.inits.is_empty()
            && self.nodes.is_empty()
            && self.finis.is_empty()
            && self.prints.is_empty()
    }

    /// Returns the last `fini` frame, if the stream completed.
    pub fn fini(&self) -> Option<&FiniFrame> {
        self.finis.last()
    }

    /// Returns the result count reported by the service, falling back to the
    /// number of decoded nodes when no `fini` frame arrived.
    pub fn result_count(&self) -> u64 {
        self.fini()
            .map_or(self.nodes.len() as u64, |fini| fini.count)
    }
}

impl Extend<Frame> for DecodedStream {
    fn extend<I: IntoIterator<Item = Frame>>(&mut self, frames: I) {
        for frame in frames {
            self.push(frame);
        }
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp decoded from epoch milliseconds.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a [`Timestamp`] from epoch milliseconds.
    ///
    /// Returns `None` if the value is outside chrono's representable range.
    pub fn from_millis(millis: i64) -> Option<Self> {
        DateTime::from_timestamp_millis(millis).map(Self)
    }

    /// Returns the timestamp as epoch milliseconds.
    pub fn as_millis(self) -> i64 {
        self.0.timestamp_millis()
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
