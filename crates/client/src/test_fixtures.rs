//! In-memory transport used by the unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use crate::config::Endpoint;
use crate::error::TransportError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, ResponseBody};

pub(crate) fn endpoint() -> Endpoint {
    Endpoint::new("cortex.test", 4443)
}

enum Canned {
    Response {
        status: u16,
        set_cookie: Option<String>,
        chunks: Vec<Vec<u8>>,
    },
    /// A 200 response held back until `gate` is notified.
    Gated { gate: Arc<Notify>, body: Vec<u8> },
    Unreachable(String),
}

/// Records every request and answers from a queue of canned responses.
#[derive(Default)]
pub(crate) struct FakeTransport {
    canned: Mutex<VecDeque<Canned>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Queues a 200 response with `body`.
    pub(crate) fn respond(&self, body: impl Into<Vec<u8>>) -> &Self {
        self.respond_with(200, None, vec![body.into()])
    }

    /// Queues a 200 response with `body` and a `Set-Cookie` header.
    pub(crate) fn respond_with_cookie(&self, body: impl Into<Vec<u8>>, cookie: &str) -> &Self {
        self.respond_with(200, Some(cookie.to_owned()), vec![body.into()])
    }

    /// Queues a response delivered in the given chunks.
    pub(crate) fn respond_with(
        &self,
        status: u16,
        set_cookie: Option<String>,
        chunks: Vec<Vec<u8>>,
    ) -> &Self {
        self.canned.lock().push_back(Canned::Response {
            status,
            set_cookie,
            chunks,
        });
        self
    }

    /// Queues a 200 response with `body` that is only delivered once `gate`
    /// is notified. Requests sent meanwhile take the responses queued after it.
    pub(crate) fn respond_when(&self, gate: Arc<Notify>, body: impl Into<Vec<u8>>) -> &Self {
        self.canned.lock().push_back(Canned::Gated {
            gate,
            body: body.into(),
        });
        self
    }

    /// Queues a connection failure.
    pub(crate) fn fail(&self, reason: &str) -> &Self {
        self.canned
            .lock()
            .push_back(Canned::Unreachable(reason.to_owned()));
        self
    }

    /// Returns every request sent so far.
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Returns the most recent request.
    pub(crate) fn last_request(&self) -> HttpRequest {
        self.requests
            .lock()
            .last()
            .cloned()
            .expect("no request was sent")
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().push(request);
        let canned = self.canned.lock().pop_front();
        match canned {
            Some(Canned::Response {
                status,
                set_cookie,
                chunks,
            }) => Ok(HttpResponse {
                status,
                set_cookie,
                body: Box::new(ChunkedBody(chunks.into())),
            }),
            Some(Canned::Gated { gate, body }) => {
                gate.notified().await;
                Ok(HttpResponse {
                    status: 200,
                    set_cookie: None,
                    body: Box::new(ChunkedBody(VecDeque::from([body]))),
                })
            }
            Some(Canned::Unreachable(reason)) => Err(TransportError::Connection(reason)),
            None => Err(TransportError::Connection("no canned response".into())),
        }
    }
}

struct ChunkedBody(VecDeque<Vec<u8>>);

#[async_trait]
impl ResponseBody for ChunkedBody {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.0.pop_front())
    }
}
