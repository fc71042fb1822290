//! Query request body.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// Stream format requested when none is set explicitly.
pub const DEFAULT_STREAM_FORMAT: &str = "jsonlines";

/// Body of a streaming query request: `{query, opts, stream}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    /// Query text.
    pub query: String,
    /// Execution options (`view`, `vars`, `limit`, ...), passed through untyped.
    pub opts: BTreeMap<String, Value>,
    /// Stream format requested from the service.
    pub stream: String,
}

impl QueryRequest {
    /// Creates a request for `query` with no options.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            opts: BTreeMap::new(),
            stream: DEFAULT_STREAM_FORMAT.to_owned(),
        }
    }

    /// Sets one execution option.
    #[must_use]
    pub fn with_opt(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.opts.insert(key.into(), value.into());
        self
    }

    /// Runs the query in the given view.
    #[must_use]
    pub fn with_view(self, view: impl Into<String>) -> Self {
        self.with_opt("view", view.into())
    }

    /// Requests a different stream format.
    #[must_use]
    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = stream.into();
        self
    }
}
