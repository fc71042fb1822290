//! HTTP transport seam.
//!
//! [`HttpTransport`] is the only point where bytes leave the process. The
//! production implementation, [`ReqwestTransport`], speaks HTTPS through
//! `reqwest`; tests substitute an in-memory fake that records requests and
//! replays canned responses.
//!
//! Response bodies are exposed chunk by chunk through [`ResponseBody`] so that
//! result streams can be decoded as they arrive.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, SET_COOKIE};
use reqwest::Method;
use serde::Serialize;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::TransportError;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// An outgoing request, relative to the service's base URL.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute path, e.g. `/api/v1/login`.
    pub path: String,
    /// Extra headers in insertion order.
    pub headers: Vec<(String, String)>,
    /// JSON-encoded body, if any.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request with no headers and no body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    /// Shorthand for a `GET` request.
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Shorthand for a `POST` request.
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Sets the body to the JSON encoding of `body`.
    ///
    /// # Errors
    ///
    /// Returns the serialization error if `body` cannot be encoded.
    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, serde_json::Error> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Replaces any header called `name` (case-insensitively) with `value`.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.remove_header(name);
        self.headers.push((name.to_owned(), value.into()));
    }

    /// Removes every header called `name` (case-insensitively).
    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// Returns the first header called `name` (case-insensitively).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A response body delivered in chunks.
#[async_trait]
pub trait ResponseBody: Send {
    /// Returns the next chunk, or `None` once the body is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}

/// A received response whose body has not yet been read.
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// The first `Set-Cookie` header, verbatim.
    pub set_cookie: Option<String>,
    /// The response body.
    pub body: Box<dyn ResponseBody>,
}

impl HttpResponse {
    /// Returns `true` for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the connection fails mid-body.
    pub async fn bytes(mut self) -> Result<Vec<u8>, TransportError> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.body.next_chunk().await? {
            buf.extend_from_slice(&chunk);
        }
        Ok(buf)
    }
}

impl std::fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("set_cookie", &self.set_cookie.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Sends requests to the service.
///
/// Implementations must not retry; retry policy belongs to the caller.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends `request` and returns the response once headers are received.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] on connection, TLS or timeout failure.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

/// [`HttpTransport`] over `reqwest` with rustls.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// Builds a transport for the endpoint and TLS settings in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Http`] if the TLS backend cannot be initialised.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self {
            http,
            base_url: config.endpoint.base_url(),
        })
    }

    /// Returns the base URL requests are resolved against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, path = %request.path, "sending request");

        let mut builder = self.http.request(request.method, &url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.header(CONTENT_TYPE, "application/json").body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let set_cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        debug!(status, path = %request.path, "received response headers");

        Ok(HttpResponse {
            status,
            set_cookie,
            body: Box::new(ReqwestBody(response)),
        })
    }
}

struct ReqwestBody(reqwest::Response);

#[async_trait]
impl ResponseBody for ReqwestBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.0.chunk().await?.map(|chunk| chunk.to_vec()))
    }
}
