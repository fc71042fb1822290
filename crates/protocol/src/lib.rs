//! Response protocol for the Synapse Cortex HTTP API.
//!
//! This crate decodes the two response formats the service speaks: the
//! uniform envelope wrapping every non-streaming call, and the concatenated
//! `[tag, payload]` frame stream returned by query execution.
//!
//! ## Architectural Layer
//!
//! **Pure decoding.** This crate has no I/O dependencies. It turns byte
//! buffers into typed values; the `client` crate owns transport and session
//! state.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`envelope`] | `{status, result}` / `{status, code, mesg}` codec |
//! | [`decoder`] | Frame stream decoder, incremental and whole-buffer |
//! | [`types`] | Frame, node and timestamp types |
//! | [`errors`] | `ServiceError`, `MalformedResponse`, `EnvelopeError` |

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod decoder;
pub mod envelope;
pub mod errors;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use decoder::{
    decode_frames, decode_frames_with, decode_payload, decode_stream, FrameDecoder, PayloadMode,
};
pub use envelope::{decode_envelope, Envelope, STATUS_OK};
pub use errors::{EnvelopeError, MalformedResponse, ServiceError};
pub use types::{
    DecodedStream, FiniFrame, Frame, InitFrame, NodeFrame, NodeInfo, PrintFrame, Timestamp,
    TAG_FINI, TAG_INIT, TAG_NODE, TAG_PRINT,
};
