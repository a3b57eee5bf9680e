//! Typed, streaming client for Docker and Podman engine APIs.
//!
//! # Crate Structure
//!
//! - [`transport`]: HTTP transport contract, engine host resolution, hyper
//!   and in-memory transports
//! - [`stream`]: framed body reader, NDJSON decoder, stdout/stderr demultiplexer
//! - [`client`]: endpoint dispatch, resource catalog, pull completion, attach sessions
//!
//! The most used client types are re-exported at the crate root.

/// Re-export transport types.
pub mod transport {
    pub use ctrprims_transport::*;
}

/// Re-export stream decoding types.
pub mod stream {
    pub use ctrprims_stream::*;
}

/// Re-export client types.
pub mod client {
    pub use ctrprims_client::*;
}

pub use ctrprims_client::{
    AttachSession, Client, ClientConfig, ClientError, EngineHost, LogOutput, Result, StreamMode,
};
