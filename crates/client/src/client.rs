//! Request-issuing client: session attachment, envelope calls and queries.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use protocol::{
    decode_envelope, decode_frames_with, DecodedStream, Frame, FrameDecoder, PayloadMode,
};

use crate::config::ClientConfig;
use crate::error::{ClientError, TransportError};
use crate::query::QueryRequest;
use crate::session::Session;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};

/// Streaming query endpoint.
pub const STORM_PATH: &str = "/api/v1/storm";
/// Single-value query endpoint.
pub const STORM_CALL_PATH: &str = "/api/v1/storm/call";
/// Service information endpoint.
pub const CORE_INFO_PATH: &str = "/api/v1/core/info";

/// A client bound to one service endpoint and one [`Session`].
pub struct Client {
    transport: Arc<dyn HttpTransport>,
    session: Session,
    payload_mode: PayloadMode,
}

impl Client {
    /// Builds a `reqwest`-backed client from `config`.
    ///
    /// An API key in `config` selects API-key mode; otherwise the session
    /// starts unauthenticated and [`Client::login`] must be called.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(config)?;
        let session = match &config.api_key {
            Some(key) => Session::with_api_key(config.endpoint.clone(), key.as_str()),
            None => Session::new(config.endpoint.clone()),
        };
        Ok(Self::with_transport(Arc::new(transport), session))
    }

    /// Builds a client over an arbitrary transport.
    pub fn with_transport(transport: Arc<dyn HttpTransport>, session: Session) -> Self {
        Self {
            transport,
            session,
            payload_mode: PayloadMode::default(),
        }
    }

    /// Sets how strictly query frame payloads are decoded.
    #[must_use]
    pub fn with_payload_mode(mut self, mode: PayloadMode) -> Self {
        self.payload_mode = mode;
        self
    }

    /// Returns the session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    // -----------------------------------------------------------------------
    // Session passthroughs
    // -----------------------------------------------------------------------

    /// See [`Session::login`].
    ///
    /// # Errors
    ///
    /// See [`Session::login`].
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ClientError> {
        self.session
            .login(self.transport.as_ref(), username, password)
            .await
    }

    /// See [`Session::logout`].
    ///
    /// # Errors
    ///
    /// See [`Session::logout`].
    pub async fn logout(&self) -> Result<(), ClientError> {
        self.session.logout(self.transport.as_ref()).await
    }

    /// See [`Session::is_active`].
    ///
    /// # Errors
    ///
    /// See [`Session::is_active`].
    pub async fn is_active(&self) -> Result<bool, ClientError> {
        self.session.is_active(self.transport.as_ref()).await
    }

    /// See [`Session::require_active`].
    ///
    /// # Errors
    ///
    /// See [`Session::require_active`].
    pub async fn require_active(&self) -> Result<(), ClientError> {
        self.session.require_active(self.transport.as_ref()).await
    }

    // -----------------------------------------------------------------------
    // Envelope calls
    // -----------------------------------------------------------------------

    /// Sends `request` with the session attached and decodes the envelope.
    ///
    /// The HTTP status is not inspected; the envelope's `status` decides.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`], [`ClientError::Service`] or
    /// [`ClientError::Malformed`].
    pub async fn call_envelope<T: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> Result<T, ClientError> {
        let request = self.session.attach(request);
        let body = self.transport.send(request).await?.bytes().await?;
        Ok(decode_envelope(&body)?)
    }

    /// Runs `query` and returns its single result value.
    ///
    /// # Errors
    ///
    /// See [`Client::call_envelope`].
    pub async fn storm_call(
        &self,
        query: &str,
        opts: BTreeMap<String, Value>,
    ) -> Result<Value, ClientError> {
        #[derive(Serialize)]
        struct CallBody<'a> {
            query: &'a str,
            opts: BTreeMap<String, Value>,
        }

        let request = HttpRequest::post(STORM_CALL_PATH).with_json(&CallBody { query, opts })?;
        self.call_envelope(request).await
    }

    /// Returns the service's self-description.
    ///
    /// # Errors
    ///
    /// See [`Client::call_envelope`].
    pub async fn core_info(&self) -> Result<Value, ClientError> {
        self.call_envelope(HttpRequest::get(CORE_INFO_PATH)).await
    }

    // -----------------------------------------------------------------------
    // Streaming queries
    // -----------------------------------------------------------------------

    /// Runs `query`, buffers the whole result stream and decodes it.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Transport`] on connection failure or a non-2xx status;
    ///   decoding is not attempted.
    /// - [`ClientError::Malformed`] if any stream value is not valid JSON.
    #[instrument(skip_all, fields(query = %query.query))]
    pub async fn run_query(&self, query: &QueryRequest) -> Result<DecodedStream, ClientError> {
        let response = self.send_query(query).await?;
        let body = response.bytes().await?;
        let frames = decode_frames_with(&body, self.payload_mode)?;
        let stream = DecodedStream::from_frames(frames);
        debug!(
            bytes = body.len(),
            nodes = stream.nodes.len(),
            "query stream decoded"
        );
        Ok(stream)
    }

    /// Runs `query`, decoding frames as response chunks arrive and handing
    /// each to `on_frame` in stream order. Returns the number of frames seen.
    ///
    /// Memory is bounded by the largest single frame rather than the whole
    /// result. Frames delivered before an error remain delivered.
    ///
    /// # Errors
    ///
    /// See [`Client::run_query`].
    #[instrument(skip_all, fields(query = %query.query))]
    pub async fn run_query_each<F>(
        &self,
        query: &QueryRequest,
        mut on_frame: F,
    ) -> Result<usize, ClientError>
    where
        F: FnMut(Frame) + Send,
    {
        let mut response = self.send_query(query).await?;
        let mut decoder = FrameDecoder::with_mode(self.payload_mode);
        let mut delivered = 0;

        while let Some(chunk) = response.body.next_chunk().await? {
            for frame in decoder.push(&chunk)? {
                delivered += 1;
                on_frame(frame);
            }
        }
        debug!(bytes = decoder.consumed(), frames = delivered, "query stream drained");
        decoder.finish()?;
        Ok(delivered)
    }

    async fn send_query(&self, query: &QueryRequest) -> Result<HttpResponse, ClientError> {
        let request = self
            .session
            .attach(HttpRequest::get(STORM_PATH).with_json(query)?);
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(TransportError::Status {
                status: response.status,
            }
            .into());
        }
        Ok(response)
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("session", &self.session)
            .field("payload_mode", &self.payload_mode)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
