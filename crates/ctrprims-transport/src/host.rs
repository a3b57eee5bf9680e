use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use url::Url;

use crate::error::{Result, TransportError};

/// Platform default engine socket.
pub const DEFAULT_UNIX_SOCKET: &str = "/var/run/docker.sock";

/// Environment variables consulted, in order, when no host is given explicitly.
pub const HOST_ENV_VARS: [&str; 4] = ["CTRPRIMS_HOST", "DOCKER_HOST", "CONTAINER_HOST", "PODMAN_HOST"];

const DEFAULT_TCP_PORT: u16 = 2375;

/// Where the engine API is served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineHost {
    /// Unix domain socket endpoint.
    Unix { path: PathBuf },
    /// Plain TCP endpoint.
    Tcp { host: String, port: u16 },
}

impl EngineHost {
    /// Builds a Unix domain socket endpoint.
    pub fn unix(path: impl Into<PathBuf>) -> Self {
        Self::Unix { path: path.into() }
    }

    /// Builds a TCP endpoint.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// Resolve the engine host from an explicit value, the environment, or the platform default.
    ///
    /// Precedence: `explicit`, then [`HOST_ENV_VARS`] in order, then
    /// [`DEFAULT_UNIX_SOCKET`]. Empty values are skipped.
    pub fn resolve(explicit: Option<&str>) -> Result<Self> {
        Self::resolve_with(explicit, |name| std::env::var(name).ok())
    }

    /// Like [`EngineHost::resolve`] with an injectable environment lookup.
    pub fn resolve_with<F>(explicit: Option<&str>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = explicit.map(str::trim).filter(|v| !v.is_empty()) {
            return value.parse();
        }

        for name in HOST_ENV_VARS {
            if let Some(value) = lookup(name) {
                let value = value.trim();
                if !value.is_empty() {
                    tracing::debug!(source = name, host = value, "engine host from environment");
                    return value.parse();
                }
            }
        }

        Ok(Self::unix(DEFAULT_UNIX_SOCKET))
    }

    /// Value for the HTTP `Host` header.
    pub fn authority(&self) -> String {
        match self {
            Self::Unix { .. } => "localhost".to_string(),
            Self::Tcp { host, port } => format!("{host}:{port}"),
        }
    }
}

impl Default for EngineHost {
    fn default() -> Self {
        Self::unix(DEFAULT_UNIX_SOCKET)
    }
}

impl fmt::Display for EngineHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { path } => write!(f, "unix://{}", path.display()),
            Self::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
        }
    }
}

impl FromStr for EngineHost {
    type Err = TransportError;

    fn from_str(input: &str) -> Result<Self> {
        if input.starts_with('/') {
            return Ok(Self::unix(input));
        }

        let invalid = |reason: &str| TransportError::InvalidHost {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(input).map_err(|err| invalid(&err.to_string()))?;
        match url.scheme() {
            "unix" => {
                let path = url.path();
                if path.is_empty() || path == "/" {
                    return Err(invalid("missing socket path"));
                }
                Ok(Self::unix(path))
            }
            "tcp" | "http" => {
                let host = url.host_str().ok_or_else(|| invalid("missing host"))?;
                let port = url
                    .port()
                    .or_else(|| (url.scheme() == "http").then_some(80))
                    .unwrap_or(DEFAULT_TCP_PORT);
                Ok(Self::tcp(host, port))
            }
            "https" => Err(invalid("TLS endpoints are not supported")),
            other => Err(invalid(&format!("unsupported scheme '{other}'"))),
        }
    }
}
