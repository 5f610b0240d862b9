//! HTTP transport seam.
//!
//! Network services and connectivity probes go through [`Transport`] so the
//! registry and engine can be driven by in-memory fakes in tests.

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::{Client, ClientBuilder, Url};
use serde_json::Value;
use servicepath_core::RequestMethod;
use std::time::Duration;
use tracing::debug;

/// Errors raised by a transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// The call exceeded its timeout
    #[error("Timed out: {0}")]
    Timeout(String),

    /// The remote end could not be reached
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Any other request failure
    #[error("Request failed: {0}")]
    Request(String),
}

/// An outgoing HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// HTTP method
    pub method: RequestMethod,
    /// URL without query string
    pub url: String,
    /// Query string pairs (GET)
    pub query: Vec<(String, String)>,
    /// Extra headers
    pub headers: IndexMap<String, String>,
    /// JSON body (POST)
    pub body: Option<Value>,
    /// Request timeout
    pub timeout: Duration,
}

impl HttpRequest {
    /// A GET request with no query.
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            method: RequestMethod::Get,
            url: url.into(),
            query: Vec::new(),
            headers: IndexMap::new(),
            body: None,
            timeout,
        }
    }

    /// Full URI including the encoded query string.
    pub fn uri(&self) -> String {
        if self.query.is_empty() {
            return self.url.clone();
        }
        Url::parse_with_params(&self.url, &self.query)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| self.url.clone())
    }
}

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code
    pub status: u16,
    /// Raw body text
    pub body: String,
}

impl HttpResponse {
    /// A 200 response with a body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self { status: 200, body: body.into() }
    }
}

/// Sends HTTP requests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one request.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create a transport. Invalid certificates are accepted.
    pub fn new() -> Self {
        Self {
            client: ClientBuilder::new()
                .danger_accept_invalid_certs(true)
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!("{} {}", request.method, request.uri());

        let mut builder = match request.method {
            RequestMethod::Get => self.client.get(&request.url).query(&request.query),
            RequestMethod::Post => self
                .client
                .post(&request.url)
                .json(request.body.as_ref().unwrap_or(&Value::Null)),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .timeout(request.timeout)
            .send()
            .await
            .map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;

        Ok(HttpResponse { status, body })
    }
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uri_encodes_query() {
        let mut request = HttpRequest::get("http://localhost:8080/predict", Duration::from_secs(1));
        request.query.push(("imageUrl".into(), "a b&c".into()));

        assert_eq!(request.uri(), "http://localhost:8080/predict?imageUrl=a+b%26c");
    }

    #[test]
    fn test_uri_without_query() {
        let request = HttpRequest::get("http://localhost:80/status", Duration::from_secs(1));
        assert_eq!(request.uri(), "http://localhost:80/status");
    }
}
