//! Engine resource models.
//!
//! These cover the fields the client itself relies on plus the commonly
//! used ones. Unknown fields are ignored and missing ones default, so the
//! same types decode Docker and Podman responses.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::endpoint::HasBody;

/// Engines send `null` for empty lists and maps.
fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// `{"Id": "..."}` style responses (create, exec create, commit).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IdResponse {
    #[serde(alias = "ID")]
    pub id: String,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

// --- containers ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Port {
    #[serde(rename = "IP", skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub private_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_port: Option<u16>,
    #[serde(rename = "Type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerSummary {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub names: Vec<String>,
    pub image: String,
    #[serde(rename = "ImageID")]
    pub image_id: String,
    pub command: String,
    pub created: i64,
    pub state: String,
    pub status: String,
    #[serde(deserialize_with = "nullable")]
    pub ports: Vec<Port>,
    #[serde(deserialize_with = "nullable")]
    pub labels: HashMap<String, String>,
}

impl ContainerSummary {
    /// First name without the leading slash the engine adds.
    pub fn display_name(&self) -> &str {
        self.names
            .first()
            .map(|name| name.trim_start_matches('/'))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerConfig {
    pub hostname: String,
    pub image: String,
    #[serde(deserialize_with = "nullable")]
    pub env: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub cmd: Vec<String>,
    pub tty: bool,
    pub open_stdin: bool,
    #[serde(deserialize_with = "nullable")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerState {
    pub status: String,
    pub running: bool,
    pub paused: bool,
    pub restarting: bool,
    #[serde(rename = "OOMKilled")]
    pub oom_killed: bool,
    pub dead: bool,
    pub pid: i64,
    pub exit_code: i64,
    pub error: String,
    pub started_at: String,
    pub finished_at: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerInspect {
    pub id: String,
    pub name: String,
    pub created: String,
    pub image: String,
    pub config: ContainerConfig,
    pub state: ContainerState,
    pub restart_count: i64,
}

/// Body of `POST /containers/create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContainerCreateBody {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub tty: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub open_stdin: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub attach_stdin: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub attach_stdout: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub attach_stderr: bool,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub labels: HashMap<String, String>,
    /// Passed through untouched (binds, port bindings, resources, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_config: Option<serde_json::Value>,
}

impl ContainerCreateBody {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    pub fn with_cmd<I, S>(mut self, cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cmd = Some(cmd.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_tty(mut self, tty: bool) -> Self {
        self.tty = tty;
        self
    }
}

impl HasBody for ContainerCreateBody {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WaitError {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerWaitResponse {
    pub status_code: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<WaitError>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ContainerTop {
    #[serde(deserialize_with = "nullable")]
    pub titles: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub processes: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuUsage {
    pub total_usage: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuStats {
    pub cpu_usage: CpuUsage,
    pub system_cpu_usage: Option<u64>,
    pub online_cpus: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    pub usage: Option<u64>,
    pub limit: Option<u64>,
}

/// One sample from `GET /containers/{id}/stats`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerStats {
    pub read: String,
    pub name: String,
    pub id: String,
    pub cpu_stats: CpuStats,
    pub precpu_stats: CpuStats,
    pub memory_stats: MemoryStats,
}

impl ContainerStats {
    /// CPU usage between this sample and the previous one, in percent of
    /// one core times the number of online cores.
    pub fn cpu_percent(&self) -> Option<f64> {
        let cpu_delta = self
            .cpu_stats
            .cpu_usage
            .total_usage
            .checked_sub(self.precpu_stats.cpu_usage.total_usage)?;
        let system_delta = self
            .cpu_stats
            .system_cpu_usage?
            .checked_sub(self.precpu_stats.system_cpu_usage?)?;
        if system_delta == 0 {
            return None;
        }
        let cpus = f64::from(self.cpu_stats.online_cpus.unwrap_or(1).max(1));
        Some(cpu_delta as f64 / system_delta as f64 * cpus * 100.0)
    }

    /// Memory usage in percent of the limit.
    pub fn memory_percent(&self) -> Option<f64> {
        let usage = self.memory_stats.usage?;
        let limit = self.memory_stats.limit.filter(|limit| *limit > 0)?;
        Some(usage as f64 / limit as f64 * 100.0)
    }
}

// --- images ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageSummary {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub repo_tags: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub repo_digests: Vec<String>,
    pub created: i64,
    pub size: i64,
    #[serde(deserialize_with = "nullable")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageInspect {
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub repo_tags: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub repo_digests: Vec<String>,
    pub created: String,
    pub architecture: String,
    pub os: String,
    pub size: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageHistoryItem {
    pub id: String,
    pub created: i64,
    pub created_by: String,
    #[serde(deserialize_with = "nullable")]
    pub tags: Vec<String>,
    pub size: i64,
    pub comment: String,
}

/// One entry of `DELETE /images/{name}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ImageDeleteItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub untagged: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<String>,
}

// --- networks ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Network {
    pub name: String,
    pub id: String,
    pub created: String,
    pub scope: String,
    pub driver: String,
    pub internal: bool,
    pub attachable: bool,
    #[serde(deserialize_with = "nullable")]
    pub labels: HashMap<String, String>,
    #[serde(deserialize_with = "nullable")]
    pub containers: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkCreateBody {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub internal: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub attachable: bool,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub labels: HashMap<String, String>,
}

impl HasBody for NetworkCreateBody {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkConnectBody {
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint_config: Option<serde_json::Value>,
}

impl HasBody for NetworkConnectBody {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkDisconnectBody {
    pub container: String,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub force: bool,
}

impl HasBody for NetworkDisconnectBody {}

// --- volumes ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Volume {
    pub name: String,
    pub driver: String,
    pub mountpoint: String,
    pub created_at: String,
    pub scope: String,
    #[serde(deserialize_with = "nullable")]
    pub labels: HashMap<String, String>,
    #[serde(deserialize_with = "nullable")]
    pub options: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VolumeList {
    #[serde(deserialize_with = "nullable")]
    pub volumes: Vec<Volume>,
    #[serde(deserialize_with = "nullable")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VolumeCreateBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub driver_opts: HashMap<String, String>,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub labels: HashMap<String, String>,
}

impl HasBody for VolumeCreateBody {}

// --- exec ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecCreateBody {
    pub cmd: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub attach_stdin: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub attach_stdout: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub attach_stderr: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub tty: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl ExecCreateBody {
    /// An exec attached to stdout and stderr.
    pub fn new<I, S>(cmd: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cmd: cmd.into_iter().map(Into::into).collect(),
            attach_stdout: true,
            attach_stderr: true,
            ..Self::default()
        }
    }
}

impl HasBody for ExecCreateBody {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExecStartBody {
    pub detach: bool,
    pub tty: bool,
}

impl HasBody for ExecStartBody {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ExecInspect {
    #[serde(rename = "ID")]
    pub id: String,
    pub running: bool,
    pub exit_code: Option<i64>,
    #[serde(rename = "ContainerID")]
    pub container_id: String,
    pub pid: i64,
}

// --- plugins ---

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Plugin {
    pub id: String,
    pub name: String,
    pub enabled: bool,
    pub plugin_reference: String,
}

// --- secrets and configs ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ObjectVersion {
    pub index: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ObjectSpec {
    pub name: String,
    #[serde(deserialize_with = "nullable")]
    pub labels: HashMap<String, String>,
}

/// A secret or config object. Both share the same outer shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SwarmObject {
    #[serde(rename = "ID")]
    pub id: String,
    pub version: ObjectVersion,
    pub created_at: String,
    pub updated_at: String,
    pub spec: ObjectSpec,
}

/// Body for creating a secret or config.
///
/// `data` is the base64-encoded payload; encoding is up to the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ObjectCreateBody {
    pub name: String,
    pub data: String,
    #[serde(skip_serializing_if = "HashMap::is_empty", default)]
    pub labels: HashMap<String, String>,
}

impl HasBody for ObjectCreateBody {}

// --- system ---

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemVersion {
    pub version: String,
    pub api_version: String,
    #[serde(rename = "MinAPIVersion")]
    pub min_api_version: String,
    pub git_commit: String,
    pub go_version: String,
    pub os: String,
    pub arch: String,
    pub kernel_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SystemInfo {
    #[serde(rename = "ID")]
    pub id: String,
    pub containers: i64,
    pub containers_running: i64,
    pub containers_paused: i64,
    pub containers_stopped: i64,
    pub images: i64,
    pub driver: String,
    pub name: String,
    pub server_version: String,
    pub operating_system: String,
    #[serde(rename = "OSType")]
    pub os_type: String,
    pub architecture: String,
    #[serde(rename = "NCPU")]
    pub ncpu: i64,
    pub mem_total: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EventActor {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(deserialize_with = "nullable")]
    pub attributes: HashMap<String, String>,
}

/// One record from `GET /events`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventMessage {
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Action")]
    pub action: String,
    #[serde(rename = "Actor")]
    pub actor: EventActor,
    pub scope: String,
    pub time: i64,
    #[serde(rename = "timeNano")]
    pub time_nano: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct DiskUsage {
    pub layers_size: i64,
    #[serde(deserialize_with = "nullable")]
    pub images: Vec<ImageSummary>,
    #[serde(deserialize_with = "nullable")]
    pub containers: Vec<ContainerSummary>,
    #[serde(deserialize_with = "nullable")]
    pub volumes: Vec<Volume>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inspect_exposes_tty() {
        let raw = r#"{"Id":"c1","Name":"/web","Config":{"Tty":true,"Image":"nginx"},"State":{"Status":"running","Running":true},"Extra":1}"#;
        let inspect: ContainerInspect = serde_json::from_str(raw).unwrap();
        assert!(inspect.config.tty);
        assert!(inspect.state.running);
        assert_eq!(inspect.config.image, "nginx");
    }

    #[test]
    fn summary_display_name_strips_slash() {
        let raw = r#"{"Id":"c1","Names":["/web"],"Ports":[{"PrivatePort":80,"Type":"tcp"}]}"#;
        let summary: ContainerSummary = serde_json::from_str(raw).unwrap();
        assert_eq!(summary.display_name(), "web");
        assert_eq!(summary.ports[0].private_port, 80);
        assert_eq!(ContainerSummary::default().display_name(), "");
    }

    #[test]
    fn create_body_omits_unset_fields() {
        let body = ContainerCreateBody::new("alpine").with_cmd(["sh", "-c", "true"]);
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"Image": "alpine", "Cmd": ["sh", "-c", "true"]})
        );
    }

    #[test]
    fn stats_percentages() {
        let raw = r#"{
            "cpu_stats": {"cpu_usage": {"total_usage": 300}, "system_cpu_usage": 2000, "online_cpus": 2},
            "precpu_stats": {"cpu_usage": {"total_usage": 100}, "system_cpu_usage": 1000},
            "memory_stats": {"usage": 50, "limit": 200}
        }"#;
        let stats: ContainerStats = serde_json::from_str(raw).unwrap();
        let cpu = stats.cpu_percent().unwrap();
        assert!((cpu - 40.0).abs() < 1e-9);
        assert_eq!(stats.memory_percent(), Some(25.0));
        assert_eq!(ContainerStats::default().cpu_percent(), None);
    }

    #[test]
    fn null_collections_decode_as_empty() {
        let raw = r#"{"Id":"sha256:1","RepoTags":null,"RepoDigests":null,"Labels":null}"#;
        let image: ImageSummary = serde_json::from_str(raw).unwrap();
        assert!(image.repo_tags.is_empty());
        assert!(image.labels.is_empty());
    }

    #[test]
    fn event_and_exec_renames() {
        let event: EventMessage = serde_json::from_str(
            r#"{"Type":"container","Action":"start","Actor":{"ID":"c1","Attributes":{"name":"web"}},"time":5,"timeNano":5000}"#,
        )
        .unwrap();
        assert_eq!(event.kind, "container");
        assert_eq!(event.actor.attributes["name"], "web");

        let exec: ExecInspect =
            serde_json::from_str(r#"{"ID":"e1","Running":false,"ExitCode":3,"ContainerID":"c1"}"#).unwrap();
        assert_eq!(exec.exit_code, Some(3));
        assert_eq!(exec.container_id, "c1");
    }
}
