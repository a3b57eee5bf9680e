use std::time::Duration;

use bytes::Bytes;
use ctrprims_transport::TransportError;

/// Errors that can occur while decoding a streamed response body.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The body ended inside a header or payload.
    #[error("stream ended mid-{unit} ({pending} bytes pending)")]
    Truncated { unit: &'static str, pending: usize },

    /// A frame header announced a payload larger than the configured maximum.
    #[error("frame payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// No line terminator was found within the configured maximum line length.
    #[error("line exceeds maximum length of {max} bytes")]
    LineTooLong { max: usize },

    /// One record could not be decoded. The sequence continues after this item.
    #[error("undecodable stream record: {source}")]
    Decode {
        raw: Bytes,
        #[source]
        source: serde_json::Error,
    },

    /// The engine reported a failure in-band via an error envelope.
    #[error("engine error: {message}")]
    Remote { message: String },

    /// The call's deadline passed while waiting for body bytes.
    #[error("stream timed out after {0:?}")]
    Timeout(Duration),

    /// The consumer cancelled the stream.
    #[error("stream cancelled")]
    Cancelled,

    /// The transport failed while pulling body bytes.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An I/O error occurred while copying output to a sink.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StreamError {
    /// Whether this item ends the sequence.
    ///
    /// Only per-record decode failures are recoverable.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Decode { .. })
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_decode_errors_are_recoverable() {
        let source = serde_json::from_slice::<serde_json::Value>(b"{").unwrap_err();
        let decode = StreamError::Decode {
            raw: Bytes::from_static(b"{"),
            source,
        };
        assert!(!decode.is_fatal());
        assert!(StreamError::Cancelled.is_fatal());
        assert!(StreamError::Truncated {
            unit: "header",
            pending: 3
        }
        .is_fatal());
    }

    #[test]
    fn truncated_message_names_unit() {
        let err = StreamError::Truncated {
            unit: "payload",
            pending: 11,
        };
        assert_eq!(err.to_string(), "stream ended mid-payload (11 bytes pending)");
    }
}
