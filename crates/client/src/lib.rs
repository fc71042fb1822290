//! Synapse Cortex HTTP client.
//!
//! Issues requests to the service over HTTPS, keeps the session credential
//! that authorizes them, and hands response bodies to the [`protocol`] crate
//! for decoding.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Transport, TLS settings, credential storage and
//! request construction live here. Decoding rules live in [`protocol`].
//!
//! ## Data flow
//!
//! ```text
//! caller -> Session (attach credential) -> HttpTransport (bytes)
//!        -> protocol::decode_envelope / protocol::FrameDecoder -> caller
//! ```
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`client`] | `Client`: envelope calls and streaming queries |
//! | [`session`] | `Session`, `Credential`, login/logout/activity check |
//! | [`transport`] | `HttpTransport` seam and the `reqwest` implementation |
//! | [`config`] | `ClientConfig`, `Endpoint`, environment loading |
//! | [`query`] | `QueryRequest` body |
//! | [`error`] | `ClientError`, `TransportError` |

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod session;
pub mod transport;

#[cfg(test)]
mod test_fixtures;

pub use client::Client;
pub use config::{ClientConfig, Endpoint};
pub use error::{ClientError, TransportError};
pub use query::QueryRequest;
pub use session::{Credential, Session};
pub use transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport, ResponseBody};

// Decoded types callers receive from this crate.
pub use protocol::{DecodedStream, Frame, PayloadMode, ServiceError};
