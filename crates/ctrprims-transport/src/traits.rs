use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::body::Body;
use crate::error::Result;

/// A fully described HTTP request, ready to be executed by a [`Transport`].
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    /// Origin-form target, e.g. `/v1.43/containers/json?all=true`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    /// Create a request with no headers and no body.
    pub fn new(method: Method, path_and_query: impl Into<String>) -> Self {
        Self {
            method,
            path_and_query: path_and_query.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Append a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Attach a request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A response whose body has not been read yet.
#[derive(Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Body,
}

/// A bidirectional byte stream obtained from an HTTP upgrade.
pub trait Duplex: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Duplex for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// An upgraded (hijacked) connection.
pub struct Upgraded {
    /// Headers of the `101 Switching Protocols` response.
    pub headers: HeaderMap,
    pub io: Box<dyn Duplex>,
}

impl fmt::Debug for Upgraded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upgraded")
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Result of asking the engine to upgrade a connection.
#[derive(Debug)]
pub enum UpgradeOutcome {
    /// The engine switched protocols; the raw connection is available.
    Switched(Upgraded),
    /// The engine answered with an ordinary response (usually an error).
    Refused(HttpResponse),
}

/// Executes HTTP requests against a container engine.
///
/// Implementations perform no retries; recovery is the caller's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and return as soon as response headers arrive.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Send a request carrying `Connection: Upgrade` and hand back the raw connection.
    async fn upgrade(&self, request: HttpRequest) -> Result<UpgradeOutcome>;

    /// Human-readable endpoint description for diagnostics.
    fn describe(&self) -> String;
}
