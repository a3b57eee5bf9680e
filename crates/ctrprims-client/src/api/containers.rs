use std::time::Duration;

use ctrprims_stream::{OutputStream, RecordStream, StreamMode};
use http::StatusCode;

use crate::attach::AttachSession;
use crate::dispatch::Client;
use crate::endpoint::{segment, Endpoint, Filters, HasQuery, Query, ResponseShape};
use crate::error::{ClientError, Result};
use crate::models::{
    ContainerCreateBody, ContainerInspect, ContainerStats, ContainerSummary, ContainerTop,
    ContainerWaitResponse, IdResponse,
};

#[derive(Debug, Clone, Default)]
pub struct ContainerListOptions {
    /// Include stopped containers.
    pub all: bool,
    pub limit: Option<u32>,
    pub size: bool,
    pub filters: Filters,
}

impl HasQuery for ContainerListOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_flag("all", self.all);
        query.push_opt("limit", self.limit);
        query.push_flag("size", self.size);
        query.push_filters(&self.filters);
    }
}

/// Options for `GET /containers/{id}/logs`.
#[derive(Debug, Clone)]
pub struct LogsOptions {
    pub follow: bool,
    pub stdout: bool,
    pub stderr: bool,
    /// Unix timestamp (seconds).
    pub since: Option<i64>,
    pub until: Option<i64>,
    pub timestamps: bool,
    /// Number of lines from the end, or `all`.
    pub tail: Option<String>,
}

impl Default for LogsOptions {
    fn default() -> Self {
        Self {
            follow: false,
            stdout: true,
            stderr: true,
            since: None,
            until: None,
            timestamps: false,
            tail: None,
        }
    }
}

impl HasQuery for LogsOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_flag("follow", self.follow);
        query.push_flag("stdout", self.stdout);
        query.push_flag("stderr", self.stderr);
        query.push_opt("since", self.since);
        query.push_opt("until", self.until);
        query.push_flag("timestamps", self.timestamps);
        query.push_opt("tail", self.tail.as_deref());
    }
}

#[derive(Debug, Clone, Default)]
pub struct StopOptions {
    /// Seconds to wait before killing.
    pub timeout: Option<u32>,
    pub signal: Option<String>,
}

impl HasQuery for StopOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_opt("t", self.timeout);
        query.push_opt("signal", self.signal.as_deref());
    }
}

#[derive(Debug, Clone, Default)]
pub struct KillOptions {
    pub signal: Option<String>,
}

impl HasQuery for KillOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_opt("signal", self.signal.as_deref());
    }
}

#[derive(Debug, Clone, Default)]
pub struct RemoveContainerOptions {
    pub force: bool,
    /// Remove anonymous volumes.
    pub volumes: bool,
    pub link: bool,
}

impl HasQuery for RemoveContainerOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_flag("force", self.force);
        query.push_flag("v", self.volumes);
        query.push_flag("link", self.link);
    }
}

#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    /// `not-running`, `next-exit` or `removed`.
    pub condition: Option<String>,
    /// Overrides the client's request timeout; waiting can take arbitrarily long.
    pub timeout: Option<Duration>,
}

impl HasQuery for WaitOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_opt("condition", self.condition.as_deref());
    }
}

#[derive(Debug, Clone)]
pub struct StatsOptions {
    /// Keep streaming samples; otherwise a single sample is returned.
    pub stream: bool,
    /// Skip the pre-sample wait (`one-shot`); only meaningful without `stream`.
    pub one_shot: bool,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            stream: true,
            one_shot: false,
        }
    }
}

impl HasQuery for StatsOptions {
    fn append_query(&self, query: &mut Query) {
        query.push("stream", self.stream);
        query.push_flag("one-shot", self.one_shot);
    }
}

#[derive(Debug, Clone, Default)]
pub struct TopOptions {
    pub ps_args: Option<String>,
}

impl HasQuery for TopOptions {
    fn append_query(&self, query: &mut Query) {
        query.push_opt("ps_args", self.ps_args.as_deref());
    }
}

/// Options for `POST /containers/{id}/attach`.
#[derive(Debug, Clone)]
pub struct AttachOptions {
    pub stdin: bool,
    pub stdout: bool,
    pub stderr: bool,
    /// Replay output produced before attaching.
    pub logs: bool,
    pub detach_keys: Option<String>,
}

impl Default for AttachOptions {
    fn default() -> Self {
        Self {
            stdin: true,
            stdout: true,
            stderr: true,
            logs: false,
            detach_keys: None,
        }
    }
}

impl HasQuery for AttachOptions {
    fn append_query(&self, query: &mut Query) {
        query.push("stream", true);
        query.push_flag("stdin", self.stdin);
        query.push_flag("stdout", self.stdout);
        query.push_flag("stderr", self.stderr);
        query.push_flag("logs", self.logs);
        query.push_opt("detachKeys", self.detach_keys.as_deref());
    }
}

/// Container endpoints.
#[derive(Debug, Clone, Copy)]
pub struct Containers<'a> {
    client: &'a Client,
}

impl<'a> Containers<'a> {
    pub(crate) fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn list(&self, options: &ContainerListOptions) -> Result<Vec<ContainerSummary>> {
        let endpoint = Endpoint::get("/containers/json").with_query(options);
        self.client.call_json(&endpoint).await
    }

    pub async fn create(&self, name: Option<&str>, body: &ContainerCreateBody) -> Result<IdResponse> {
        let endpoint = Endpoint::post("/containers/create")
            .query_opt("name", name)
            .with_body(body)?;
        self.client.call_json(&endpoint).await
    }

    pub async fn inspect(&self, id: &str) -> Result<ContainerInspect> {
        let endpoint = Endpoint::get(format!("/containers/{}/json", segment(id)?));
        self.client.call_json(&endpoint).await
    }

    /// Output format of the container's logs and attach streams.
    pub async fn stream_mode(&self, id: &str) -> Result<StreamMode> {
        Ok(StreamMode::from_tty(self.inspect(id).await?.config.tty))
    }

    /// Start a container. Starting a running container is not an error.
    pub async fn start(&self, id: &str) -> Result<()> {
        let endpoint = Endpoint::post(format!("/containers/{}/start", segment(id)?));
        not_modified_ok(self.client.call_raw(&endpoint).await)
    }

    /// Stop a container. Stopping a stopped container is not an error.
    pub async fn stop(&self, id: &str, options: &StopOptions) -> Result<()> {
        let endpoint =
            Endpoint::post(format!("/containers/{}/stop", segment(id)?)).with_query(options);
        not_modified_ok(self.client.call_raw(&endpoint).await)
    }

    pub async fn restart(&self, id: &str, options: &StopOptions) -> Result<()> {
        let endpoint =
            Endpoint::post(format!("/containers/{}/restart", segment(id)?)).with_query(options);
        self.client.call_raw(&endpoint).await
    }

    pub async fn kill(&self, id: &str, options: &KillOptions) -> Result<()> {
        let endpoint =
            Endpoint::post(format!("/containers/{}/kill", segment(id)?)).with_query(options);
        self.client.call_raw(&endpoint).await
    }

    pub async fn pause(&self, id: &str) -> Result<()> {
        let endpoint = Endpoint::post(format!("/containers/{}/pause", segment(id)?));
        self.client.call_raw(&endpoint).await
    }

    pub async fn unpause(&self, id: &str) -> Result<()> {
        let endpoint = Endpoint::post(format!("/containers/{}/unpause", segment(id)?));
        self.client.call_raw(&endpoint).await
    }

    pub async fn remove(&self, id: &str, options: &RemoveContainerOptions) -> Result<()> {
        let endpoint =
            Endpoint::delete(format!("/containers/{}", segment(id)?)).with_query(options);
        self.client.call_raw(&endpoint).await
    }

    pub async fn rename(&self, id: &str, name: &str) -> Result<()> {
        let endpoint =
            Endpoint::post(format!("/containers/{}/rename", segment(id)?)).query("name", name);
        self.client.call_raw(&endpoint).await
    }

    /// Block until the container reaches the requested condition.
    pub async fn wait(&self, id: &str, options: &WaitOptions) -> Result<ContainerWaitResponse> {
        let mut endpoint =
            Endpoint::post(format!("/containers/{}/wait", segment(id)?)).with_query(options);
        if let Some(timeout) = options.timeout {
            endpoint = endpoint.timeout(timeout);
        }
        self.client.call_json(&endpoint).await
    }

    pub async fn top(&self, id: &str, options: &TopOptions) -> Result<ContainerTop> {
        let endpoint =
            Endpoint::get(format!("/containers/{}/top", segment(id)?)).with_query(options);
        self.client.call_json(&endpoint).await
    }

    /// Container output. `mode` must match the container's TTY setting;
    /// see [`Containers::stream_mode`].
    pub async fn logs(
        &self,
        id: &str,
        options: &LogsOptions,
        mode: StreamMode,
    ) -> Result<OutputStream> {
        if !options.stdout && !options.stderr {
            return Err(ClientError::InvalidRequest(
                "logs needs stdout or stderr".to_string(),
            ));
        }
        let endpoint = Endpoint::get(format!("/containers/{}/logs", segment(id)?))
            .with_query(options)
            .shape(ResponseShape::Demuxed(mode));
        self.client.call_output(&endpoint).await
    }

    /// Resource usage samples as they arrive.
    pub async fn stats(&self, id: &str, options: &StatsOptions) -> Result<RecordStream<ContainerStats>> {
        let endpoint = Endpoint::get(format!("/containers/{}/stats", segment(id)?))
            .with_query(options)
            .shape(ResponseShape::Ndjson(Default::default()));
        self.client.call_records(&endpoint).await
    }

    /// A single resource usage sample.
    pub async fn stats_once(&self, id: &str) -> Result<ContainerStats> {
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let endpoint =
            Endpoint::get(format!("/containers/{}/stats", segment(id)?)).with_query(&options);
        self.client.call_json(&endpoint).await
    }

    /// Attach to a running container's stdio.
    pub async fn attach(
        &self,
        id: &str,
        options: &AttachOptions,
        mode: StreamMode,
    ) -> Result<AttachSession> {
        let endpoint =
            Endpoint::post(format!("/containers/{}/attach", segment(id)?)).with_query(options);
        self.client.upgrade(&endpoint, mode).await
    }
}

/// Treat `304 Not Modified` (already in the requested state) as success.
fn not_modified_ok(result: Result<()>) -> Result<()> {
    match result {
        Err(ClientError::Api { status, .. }) if status == StatusCode::NOT_MODIFIED => Ok(()),
        other => other,
    }
}
