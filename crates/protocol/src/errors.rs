//! Error types produced while decoding service responses.
//!
//! Decoding distinguishes two outcomes that callers must handle differently:
//!
//! - [`ServiceError`]: the body was a well-formed envelope that reported
//!   `status != "ok"`. The service's own `code` and `mesg` are carried verbatim.
//! - [`MalformedResponse`]: the body could not be decoded at all, either as an
//!   envelope or as a frame within a result stream.
//!
//! [`EnvelopeError`] is the union of the two, returned by the envelope codec.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Service-reported failure
// ---------------------------------------------------------------------------

/// A failure reported by the service inside a well-formed envelope.
///
/// The service returns HTTP 200 for application-level errors, so this is the
/// only channel through which it reports rejected requests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("service error {code}: {message}")]
pub struct ServiceError {
    /// Machine-readable error class (e.g. `"AuthDeny"`, `"NoSuchView"`).
    pub code: String,
    /// Human-readable message from the envelope's `mesg` field.
    pub message: String,
}

impl ServiceError {
    /// Creates a [`ServiceError`] from its code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Undecodable body
// ---------------------------------------------------------------------------

/// A response body that matches none of the expected wire shapes.
///
/// For result streams `offset` is the absolute byte offset at which the
/// offending value began. Envelope failures have no offset.
#[derive(Debug, Error)]
#[error("{}", describe(.offset, .source))]
pub struct MalformedResponse {
    /// Byte offset into the stream, when decoding a result stream.
    pub offset: Option<usize>,
    /// The underlying parse diagnostic.
    #[source]
    pub source: serde_json::Error,
}

fn describe(offset: &Option<usize>, source: &serde_json::Error) -> String {
    match offset {
        Some(offset) => format!("malformed stream value at byte {offset}: {source}"),
        None => format!("malformed response body: {source}"),
    }
}

impl MalformedResponse {
    /// Wraps an envelope parse failure.
    pub fn envelope(source: serde_json::Error) -> Self {
        Self {
            offset: None,
            source,
        }
    }

    /// Wraps a stream parse failure at `offset`.
    pub fn frame(offset: usize, source: serde_json::Error) -> Self {
        Self {
            offset: Some(offset),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope decode outcome
// ---------------------------------------------------------------------------

/// Everything that can go wrong while decoding a non-streaming response.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The envelope reported failure.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The body matched neither envelope shape.
    #[error(transparent)]
    Malformed(#[from] MalformedResponse),
}

impl EnvelopeError {
    /// Returns the human-readable message, preferring the service's `mesg`.
    pub fn message(&self) -> String {
        match self {
            Self::Service(err) => err.message.clone(),
            Self::Malformed(err) => err.to_string(),
        }
    }
}
