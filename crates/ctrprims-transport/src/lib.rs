//! HTTP transport contract for container engine APIs.
//!
//! Provides a unified interface over the ways a client reaches an engine:
//! - Unix domain sockets (`unix:///var/run/docker.sock`)
//! - TCP (`tcp://host:2375`)
//! - An in-memory scripted transport for tests and offline replay
//!
//! This is the lowest layer of ctrprims. Everything else consumes the
//! [`Transport`] trait and the incremental [`Body`] it yields.

pub mod body;
pub mod connect;
pub mod error;
pub mod host;
pub mod hyper_transport;
pub mod memory;
pub mod traits;

pub use body::{Body, ChunkSource, DEFAULT_PULL_SIZE};
pub use error::{Result, TransportError};
pub use host::{EngineHost, DEFAULT_UNIX_SOCKET, HOST_ENV_VARS};
pub use hyper_transport::HyperTransport;
pub use memory::{MemoryTransport, RecordedRequest};
pub use traits::{Duplex, HttpRequest, HttpResponse, Transport, UpgradeOutcome, Upgraded};
