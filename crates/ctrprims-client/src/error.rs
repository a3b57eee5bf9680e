use std::time::Duration;

use ctrprims_stream::StreamError;
use ctrprims_transport::TransportError;
use http::StatusCode;

/// Errors that can occur in engine API calls.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Connection-level failure. Never retried automatically.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The call's deadline passed.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The engine reported a failure, either as a non-2xx response or in-band
    /// in a progress stream (in which case `status` is the stream's own status).
    #[error("engine error ({status}): {message}")]
    Api { status: StatusCode, message: String },

    /// A response did not match the expected schema.
    #[error("failed to decode {context}: {source}")]
    Decode {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A streamed body ended inside a frame or header.
    #[error("stream ended mid-{unit} ({pending} bytes pending)")]
    TruncatedStream { unit: &'static str, pending: usize },

    /// A successful response matched none of the expected shapes.
    #[error("unrecognised engine response: {raw}")]
    UnknownResponse { raw: String },

    /// Input was written to an attach session that is closing or closed.
    #[error("attach session is closed")]
    SessionClosed,

    /// Any other stream failure (cancellation, size limits, sink I/O).
    #[error("stream error: {0}")]
    Stream(StreamError),

    /// The request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// HTTP status reported by the engine, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the engine answered 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}

impl From<StreamError> for ClientError {
    fn from(err: StreamError) -> Self {
        match err {
            StreamError::Truncated { unit, pending } => Self::TruncatedStream { unit, pending },
            StreamError::Timeout(budget) => Self::Timeout(budget),
            StreamError::Transport(err) => Self::Transport(err),
            StreamError::Remote { message } => Self::Api {
                status: StatusCode::OK,
                message,
            },
            StreamError::Decode { raw, source } => Self::Decode {
                context: format!("stream record ({} bytes)", raw.len()),
                source,
            },
            other => Self::Stream(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
