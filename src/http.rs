//! HTTP transport built on reqwest.
//!
//! Handles client construction (timeout, proxy), authentication, and the
//! mapping of non-success statuses to [`ClientError::Api`].

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::client::{ClientError, Result};
use crate::options::{HttpTransport, SecretString, TransportOptions};
use crate::sse::{utf8_text, SseLinesExt};
use crate::transport::{LineStream, Method, Transport, TransportRequest};

/// Default root of the Gemini REST API.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com";

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Build a configured HTTP client from transport options.
///
/// This applies common configuration like timeouts and proxies.
pub fn build_http_client(
    transport_options: &TransportOptions<HttpTransport>,
) -> std::result::Result<Client, reqwest::Error> {
    let mut builder = Client::builder();

    if let Some(timeout) = transport_options.timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = &transport_options.provider.proxy {
        match reqwest::Proxy::all(proxy_url) {
            Ok(proxy) => builder = builder.proxy(proxy),
            Err(e) => warn!(proxy = %proxy_url, error = %e, "ignoring invalid proxy"),
        }
    }

    builder.build()
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    code: u16,
    message: String,
}

/// Map an error response to [`ClientError::Api`], preferring the API's own
/// `{"error": {"code", "message"}}` payload over the raw body.
fn handle_error_response(status: reqwest::StatusCode, body: &str) -> ClientError {
    match serde_json::from_str::<GeminiErrorResponse>(body) {
        Ok(error_resp) => ClientError::Api {
            status: error_resp.error.code,
            message: error_resp.error.message,
        },
        Err(_) => ClientError::Api {
            status: status.as_u16(),
            message: body.to_string(),
        },
    }
}

/// Body of an error response; a read failure is logged and yields "".
fn body_or_empty(body: reqwest::Result<String>) -> String {
    body.unwrap_or_else(|e| {
        debug!(error = %e, "failed to read error body");
        String::new()
    })
}

/// [`Transport`] over HTTPS with an API key header.
///
/// Cheap to share: the inner reqwest client pools connections.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    api_key: SecretString,
    extra_headers: Option<HashMap<String, String>>,
}

impl ReqwestTransport {
    pub fn new(transport_options: &TransportOptions<HttpTransport>) -> Result<Self> {
        let api_key = transport_options
            .provider
            .api_key
            .clone()
            .ok_or_else(|| ClientError::Config("API key is required".to_string()))?;

        let base_url = transport_options
            .provider
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            client: build_http_client(transport_options)?,
            base_url,
            api_key,
            extra_headers: transport_options.provider.extra_headers.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build(&self, request: TransportRequest) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, request.path);
        let mut req = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        req = req.header(API_KEY_HEADER, self.api_key.expose_secret());
        req = add_extra_headers(req, &self.extra_headers);

        if let Some(body) = request.body {
            req = req.header(CONTENT_TYPE, "application/json").body(body);
        }
        req
    }

    /// Send and fail on any non-success status.
    async fn execute(&self, request: TransportRequest) -> Result<reqwest::Response> {
        debug!(method = ?request.method, path = %request.path, "sending request");
        let response = self.build(request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = body_or_empty(response.text().await);
            warn!(status = status.as_u16(), "request failed");
            debug!(body = %body, "error body");
            return Err(handle_error_response(status, &body));
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send_unary(&self, request: TransportRequest) -> Result<String> {
        let response = self.execute(request).await?;
        utf8_text(&response.bytes().await?)
    }

    async fn send_streamed(&self, request: TransportRequest) -> Result<LineStream> {
        let response = self.execute(request).await?;
        Ok(Box::pin(response.sse_lines()))
    }
}
