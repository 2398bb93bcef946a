//! HTTP transport.
//!
//! The client only needs one thing from HTTP: POST a body and get the status
//! and body back. [`HttpTransport`] is that seam; [`HyperTransport`] is the
//! default, plain-HTTP implementation. TLS, proxies or auth go in a custom
//! transport.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

/// A received HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Canonical reason phrase, when known.
    pub reason: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Creates a response with no headers.
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            reason: None,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A request that never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid url `{url}`: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("unsupported url scheme `{0}`, the default transport speaks plain http only")]
    UnsupportedScheme(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("response body exceeds {0} bytes")]
    BodyTooLarge(usize),
}

/// Sends one POST request.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn post(
        &self,
        url: &str,
        content_type: &str,
        headers: &[(String, String)],
        body: Bytes,
    ) -> Result<HttpResponse, TransportError>;
}

/// Largest response body [`HyperTransport`] reads by default (16 MiB).
pub const DEFAULT_MAX_BODY: usize = 16 * 1024 * 1024;

/// HTTP/1 transport on the hyper legacy client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    max_body: usize,
}

impl HyperTransport {
    /// Creates a transport with a fresh connection pool.
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
            max_body: DEFAULT_MAX_BODY,
        }
    }

    /// Sets the largest response body read before failing with
    /// [`TransportError::BodyTooLarge`].
    #[must_use]
    pub fn with_max_body(mut self, limit: usize) -> Self {
        self.max_body = limit;
        self
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport")
            .field("max_body", &self.max_body)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HttpTransport for HyperTransport {
    async fn post(
        &self,
        url: &str,
        content_type: &str,
        headers: &[(String, String)],
        body: Bytes,
    ) -> Result<HttpResponse, TransportError> {
        let uri = parse_url(url)?;

        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, content_type);
        for (key, value) in headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        let request = builder
            .body(Full::new(body))
            .map_err(|e| TransportError::Request(e.to_string()))?;

        let response = self.client.request(request).await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Request(e.to_string())
            }
        })?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (key.as_str().to_owned(), value.to_owned()))
            })
            .collect();
        let body = Limited::new(response.into_body(), self.max_body)
            .collect()
            .await
            .map_err(|e| {
                if e.downcast_ref::<LengthLimitError>().is_some() {
                    TransportError::BodyTooLarge(self.max_body)
                } else {
                    TransportError::Body(e.to_string())
                }
            })?
            .to_bytes();

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_owned),
            headers,
            body,
        })
    }
}

fn parse_url(url: &str) -> Result<Uri, TransportError> {
    let uri = url
        .trim()
        .parse::<Uri>()
        .map_err(|e| TransportError::InvalidUrl {
            url: url.to_owned(),
            message: e.to_string(),
        })?;

    match uri.scheme_str() {
        Some("http") => Ok(uri),
        Some(other) => Err(TransportError::UnsupportedScheme(other.to_owned())),
        None => Err(TransportError::InvalidUrl {
            url: url.to_owned(),
            message: "missing scheme".to_owned(),
        }),
    }
}
