//! Typed client for container engine (Docker / Podman) HTTP APIs.
//!
//! The [`Client`] turns [`Endpoint`] descriptors into transport calls and
//! hands back typed results:
//! - single JSON values, buffered and decoded once
//! - NDJSON record streams (events, stats, pull progress)
//! - demultiplexed container output (logs)
//! - bidirectional [`AttachSession`]s over upgraded connections
//!
//! Resource handles (`client.containers()`, `client.images()`, ...) build
//! the descriptors for the common engine endpoints.
//!
//! ```no_run
//! # async fn demo() -> ctrprims_client::Result<()> {
//! use ctrprims_client::{Client, ClientConfig, ContainerListOptions};
//!
//! let client = Client::from_env(ClientConfig::default())?;
//! for container in client.containers().list(&ContainerListOptions::default()).await? {
//!     println!("{} {}", container.display_name(), container.status);
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod attach;
pub mod config;
pub mod dispatch;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod pull;

pub use api::{
    AttachOptions, ContainerListOptions, Containers, EventsOptions, Exec, ImageListOptions, Images,
    KillOptions, ListOptions, LogsOptions, Networks, ObjectKind, Plugins, PullOptions, PushOptions,
    RegistryAuth, RemoveContainerOptions, RemoveImageOptions, StatsOptions, StopOptions,
    SwarmObjects, System, TagOptions, TopOptions, Volumes, WaitOptions,
};
pub use attach::{AttachInput, AttachSession, SessionState};
pub use config::{ClientConfig, DEFAULT_MAX_ERROR_BODY, DEFAULT_REQUEST_TIMEOUT};
pub use dispatch::{Client, Dispatch, StreamingResponse};
pub use endpoint::{
    segment, Endpoint, Filters, HasBody, HasQuery, MapsRawResponse, Query, RawResponse,
    ResponseShape,
};
pub use error::{ClientError, Result};
pub use pull::{detect_completion, CompletionMarker, ProgressMessage, PullResult, PullStream};

pub use ctrprims_stream::{LogOutput, OutputStream, RecordStream, StreamChannel, StreamMode};
pub use ctrprims_transport::EngineHost;
