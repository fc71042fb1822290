//! Client error taxonomy.
//!
//! Every failure a call can produce falls into one of these kinds, and all of
//! them propagate to the caller unchanged:
//!
//! | Variant | Meaning |
//! |---------|---------|
//! | [`ClientError::Transport`] | The service could not be reached (connection, TLS, timeout, unexpected HTTP status) |
//! | [`ClientError::Auth`] | Credentials were rejected or the session is no longer active |
//! | [`ClientError::Service`] | A well-formed envelope reported `status != "ok"` |
//! | [`ClientError::Malformed`] | The body matched no expected wire shape |
//! | [`ClientError::Configuration`] | The client was misconfigured or misused |
//!
//! Nothing here is retried automatically.

use protocol::{EnvelopeError, MalformedResponse, ServiceError};
use thiserror::Error;

/// Failure to complete an HTTP exchange.
#[derive(Debug, Error)]
pub enum TransportError {
    /// `reqwest` failed to send the request or read the body.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A non-`reqwest` transport failed to reach the service.
    #[error("connection failed: {0}")]
    Connection(String),

    /// The service answered with a status the endpoint never uses for results.
    #[error("unexpected HTTP status {status}")]
    Status {
        /// HTTP status code received.
        status: u16,
    },
}

/// Errors returned by [`crate::Client`] and [`crate::Session`].
#[derive(Debug, Error)]
pub enum ClientError {
    /// The service could not be reached.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Login was rejected or the session is inactive.
    #[error("authentication failed: {message}")]
    Auth {
        /// Service-provided or locally generated reason.
        message: String,
    },

    /// The service reported an application-level failure.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The response body could not be decoded.
    #[error(transparent)]
    Malformed(#[from] MalformedResponse),

    /// A request body could not be encoded.
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),

    /// The client configuration is invalid or the call does not apply to it.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },
}

impl ClientError {
    /// Creates an [`ClientError::Auth`].
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Creates a [`ClientError::Configuration`].
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if the service could not be reached.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Returns `true` if credentials were rejected or the session is inactive.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }
}

impl From<EnvelopeError> for ClientError {
    fn from(value: EnvelopeError) -> Self {
        match value {
            EnvelopeError::Service(err) => Self::Service(err),
            EnvelopeError::Malformed(err) => Self::Malformed(err),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        Self::Transport(TransportError::Http(value))
    }
}
