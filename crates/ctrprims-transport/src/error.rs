/// Errors that can occur in engine transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to connect to the engine endpoint.
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The HTTP exchange failed (handshake, framing, reset).
    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    /// The request could not be expressed as an HTTP request.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The engine host string could not be parsed.
    #[error("invalid engine host '{input}': {reason}")]
    InvalidHost { input: String, reason: String },

    /// The upgraded connection could not be established.
    #[error("connection upgrade failed: {0}")]
    Upgrade(String),

    /// The transport has no more scripted responses or was shut down.
    #[error("transport shut down")]
    Shutdown,
}

impl From<http::Error> for TransportError {
    fn from(err: http::Error) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
