use std::fmt;
use std::io;

use ctrprims_client::ClientError;
use ctrprims_stream::StreamError;
use ctrprims_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const NOT_FOUND: i32 = 44;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const API_ERROR: i32 = 69;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound
        | io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::BrokenPipe => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Connect { endpoint, source } => {
            let mut mapped = io_error(&format!("{context}: cannot reach {endpoint}"), source);
            if mapped.code == INTERNAL {
                mapped.code = TRANSPORT_ERROR;
            }
            mapped
        }
        TransportError::Io(source) => io_error(context, source),
        TransportError::InvalidHost { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ClientError::Api { status, .. } if status.as_u16() == 404 => {
            CliError::new(NOT_FOUND, format!("{context}: {err}"))
        }
        ClientError::Api { .. } => CliError::new(API_ERROR, format!("{context}: {err}")),
        ClientError::Decode { .. }
        | ClientError::TruncatedStream { .. }
        | ClientError::UnknownResponse { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        ClientError::InvalidRequest(_) => CliError::new(USAGE, format!("{context}: {err}")),
        ClientError::SessionClosed => CliError::new(FAILURE, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

pub fn stream_error(context: &str, err: StreamError) -> CliError {
    client_error(context, ClientError::from(err))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ctrprims_client::ClientError;

    use super::*;

    fn api(status: u16) -> ClientError {
        ClientError::Api {
            status: status.try_into().unwrap(),
            message: "boom".to_string(),
        }
    }

    #[test]
    fn api_errors_map_by_status() {
        assert_eq!(client_error("inspect", api(404)).code, NOT_FOUND);
        assert_eq!(client_error("inspect", api(409)).code, API_ERROR);
        assert_eq!(client_error("inspect", api(500)).code, API_ERROR);
    }

    #[test]
    fn unreachable_engine_is_transport_error() {
        let err = ClientError::Transport(TransportError::Connect {
            endpoint: "unix:///nope.sock".to_string(),
            source: io::Error::from(io::ErrorKind::NotFound),
        });
        let mapped = client_error("ping", err);
        assert_eq!(mapped.code, TRANSPORT_ERROR);
        assert!(mapped.message.contains("unix:///nope.sock"));
    }

    #[test]
    fn stream_failures() {
        assert_eq!(
            client_error("logs", ClientError::Timeout(Duration::from_secs(1))).code,
            TIMEOUT
        );
        let truncated = StreamError::Truncated {
            unit: "header",
            pending: 3,
        };
        assert_eq!(stream_error("logs", truncated).code, DATA_INVALID);
        assert_eq!(
            client_error("attach", ClientError::SessionClosed).code,
            FAILURE
        );
    }
}
