//! Transport capability used by the executor.
//!
//! The executor only needs two calls: one returning a whole body, and one
//! returning the body as a lazy sequence of lines. [`ReqwestTransport`] is the
//! HTTP implementation; tests plug in scripted ones.
//!
//! [`ReqwestTransport`]: crate::http::ReqwestTransport

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::client::Result;

/// Lines of a streamed body in arrival order, without line terminators.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request relative to the API root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportRequest {
    pub method: Method,
    /// Path below the base URL, e.g. `v1beta/models/gemini-2.0-flash:generateContent`.
    pub path: String,
    pub query: Vec<(String, String)>,
    /// JSON body.
    pub body: Option<String>,
}

impl TransportRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body.into()),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request and return the body of a successful response.
    async fn send_unary(&self, request: TransportRequest) -> Result<String>;

    /// Send the request and return the response body as lines.
    ///
    /// Implementations must not read ahead of the consumer, and dropping the
    /// returned stream must release the underlying response.
    async fn send_streamed(&self, request: TransportRequest) -> Result<LineStream>;
}
