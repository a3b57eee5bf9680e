use std::time::Duration;

use ctrprims_stream::StreamConfig;

use crate::endpoint::{Endpoint, ResponseShape};

/// Default deadline for point-in-time calls: 120 seconds.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Default cap on buffered error bodies: 64 KiB.
pub const DEFAULT_MAX_ERROR_BODY: usize = 64 * 1024;

/// Configuration for a [`crate::Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Deadline for calls with a single-value response. Default: 120 s.
    pub request_timeout: Duration,
    /// Deadline for streaming calls (logs, events, stats, pull). Default: none.
    pub stream_timeout: Option<Duration>,
    /// API version prefix, e.g. `1.43` for `/v1.43/...`. Default: unversioned.
    pub api_version: Option<String>,
    /// Maximum bytes of a non-2xx body read for the error message.
    pub max_error_body: usize,
    /// Stream decoding limits.
    pub stream: StreamConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            stream_timeout: None,
            api_version: None,
            max_error_body: DEFAULT_MAX_ERROR_BODY,
            stream: StreamConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Set the point-in-time request deadline.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set (or clear) the streaming call deadline.
    pub fn with_stream_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stream_timeout = timeout;
        self
    }

    /// Pin the API version prefix.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        let version = version.trim_start_matches('v').to_string();
        self.api_version = (!version.is_empty()).then_some(version);
        self
    }

    /// Deadline budget for one call; an endpoint override wins.
    pub fn timeout_for(&self, endpoint: &Endpoint) -> Option<Duration> {
        if let Some(timeout) = endpoint.timeout_override() {
            return Some(timeout);
        }
        match endpoint.response_shape() {
            ResponseShape::Single => Some(self.request_timeout),
            ResponseShape::Ndjson(_) | ResponseShape::Demuxed(_) => self.stream_timeout,
        }
    }
}
