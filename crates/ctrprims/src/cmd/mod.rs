use std::time::Duration;

use clap::{Args, Subcommand};
use ctrprims_client::{Client, ClientConfig, EngineHost, Filters};

use crate::exit::{client_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod attach;
pub mod events;
pub mod images;
pub mod inspect;
pub mod logs;
pub mod ping;
pub mod ps;
pub mod pull;
pub mod stats;
pub mod version;

/// Connection options shared by every command.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Engine endpoint (unix:///path/to.sock or tcp://host:port).
    /// Defaults to CTRPRIMS_HOST, DOCKER_HOST, CONTAINER_HOST or PODMAN_HOST,
    /// then the local Docker socket.
    #[arg(long, short = 'H', value_name = "URL", global = true)]
    pub host: Option<String>,

    /// Deadline for point-in-time requests (e.g. 30s, 500ms).
    #[arg(long, value_name = "DURATION", default_value = "120s", global = true)]
    pub timeout: String,

    /// Pin the engine API version (e.g. 1.43).
    #[arg(long, value_name = "VERSION", global = true)]
    pub api_version: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show client (and optionally engine) version information.
    Version(VersionArgs),
    /// Check that the engine answers.
    Ping(PingArgs),
    /// List containers.
    Ps(PsArgs),
    /// List images.
    Images(ImagesArgs),
    /// Show low-level information on a container or image.
    Inspect(InspectArgs),
    /// Pull an image and report its digest.
    Pull(PullArgs),
    /// Print a container's output.
    Logs(LogsArgs),
    /// Stream engine events.
    Events(EventsArgs),
    /// Show container resource usage.
    Stats(StatsArgs),
    /// Attach local stdin/stdout/stderr to a running container.
    Attach(AttachArgs),
}

pub async fn run(command: Command, globals: &GlobalArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Version(args) => version::run(args, globals, format).await,
        Command::Ping(args) => ping::run(args, globals, format).await,
        Command::Ps(args) => ps::run(args, globals, format).await,
        Command::Images(args) => images::run(args, globals, format).await,
        Command::Inspect(args) => inspect::run(args, globals, format).await,
        Command::Pull(args) => pull::run(args, globals, format).await,
        Command::Logs(args) => logs::run(args, globals).await,
        Command::Events(args) => events::run(args, globals, format).await,
        Command::Stats(args) => stats::run(args, globals, format).await,
        Command::Attach(args) => attach::run(args, globals).await,
    }
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
    /// Also query the engine's version.
    #[arg(long)]
    pub engine: bool,
}

#[derive(Args, Debug, Default)]
pub struct PingArgs {}

#[derive(Args, Debug)]
pub struct PsArgs {
    /// Include stopped containers.
    #[arg(long, short = 'a')]
    pub all: bool,
    /// Filter output (e.g. status=running, label=tier=web). Repeatable.
    #[arg(long, short = 'f', value_name = "KEY=VALUE", value_parser = parse_filter)]
    pub filter: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct ImagesArgs {
    /// Include intermediate images.
    #[arg(long, short = 'a')]
    pub all: bool,
    /// Filter output (e.g. dangling=true). Repeatable.
    #[arg(long, short = 'f', value_name = "KEY=VALUE", value_parser = parse_filter)]
    pub filter: Vec<(String, String)>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Container or image id/name.
    pub target: String,
    /// Inspect an image instead of a container.
    #[arg(long)]
    pub image: bool,
}

#[derive(Args, Debug)]
pub struct PullArgs {
    /// Image reference (e.g. alpine:3.20).
    pub image: String,
    /// Platform in os[/arch[/variant]] form.
    #[arg(long)]
    pub platform: Option<String>,
    /// Opaque X-Registry-Auth value (base64 JSON credentials).
    #[arg(long, env = "CTRPRIMS_REGISTRY_AUTH", hide_env_values = true)]
    pub registry_auth: Option<String>,
    /// Only print the resulting digest.
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Container id or name.
    pub container: String,
    /// Keep streaming new output.
    #[arg(long, short = 'f')]
    pub follow: bool,
    /// Number of lines from the end (or "all").
    #[arg(long, short = 'n')]
    pub tail: Option<String>,
    /// Prefix each line with its timestamp.
    #[arg(long, short = 't')]
    pub timestamps: bool,
    /// Only output since this Unix timestamp.
    #[arg(long)]
    pub since: Option<i64>,
}

#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Show events since this timestamp.
    #[arg(long)]
    pub since: Option<String>,
    /// Stop at this timestamp.
    #[arg(long)]
    pub until: Option<String>,
    /// Filter events (e.g. type=container). Repeatable.
    #[arg(long, short = 'f', value_name = "KEY=VALUE", value_parser = parse_filter)]
    pub filter: Vec<(String, String)>,
    /// Exit after N events.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Container id or name.
    pub container: String,
    /// Print one sample and exit.
    #[arg(long)]
    pub no_stream: bool,
}

#[derive(Args, Debug)]
pub struct AttachArgs {
    /// Container id or name.
    pub container: String,
    /// Do not forward local stdin.
    #[arg(long)]
    pub no_stdin: bool,
}

/// Build a client from the global options.
pub fn client(globals: &GlobalArgs) -> CliResult<Client> {
    let host = EngineHost::resolve(globals.host.as_deref())
        .map_err(|err| transport_error("engine host", err))?;
    let mut config = ClientConfig::default().with_request_timeout(parse_timeout(&globals.timeout)?);
    if let Some(version) = &globals.api_version {
        config = config.with_api_version(version.as_str());
    }
    tracing::debug!(%host, "using engine");
    Ok(Client::for_host(host, config))
}

pub fn filters(pairs: &[(String, String)]) -> Filters {
    pairs
        .iter()
        .fold(Filters::new(), |filters, (key, value)| filters.add(key, value))
}

fn parse_filter(input: &str) -> Result<(String, String), String> {
    match input.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{input}'")),
    }
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('m') {
        (num, "m")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        "m" => Duration::from_secs(value.saturating_mul(60)),
        _ => Duration::from_secs(value),
    })
}

/// Context-tagged client error mapping for command bodies.
pub fn failed(context: &str) -> impl FnOnce(ctrprims_client::ClientError) -> CliError + '_ {
    move |err| client_error(context, err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timeout_units() {
        assert_eq!(parse_timeout("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_timeout("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_timeout("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_timeout("2m").unwrap(), Duration::from_secs(120));
    }

    #[test]
    fn parse_timeout_invalid() {
        assert!(parse_timeout("0s").is_err());
        assert!(parse_timeout("bad").is_err());
        assert!(parse_timeout("").is_err());
    }

    #[test]
    fn filter_pairs() {
        assert_eq!(
            parse_filter("label=tier=web").unwrap(),
            ("label".to_string(), "tier=web".to_string())
        );
        assert!(parse_filter("=x").is_err());
        assert!(parse_filter("novalue").is_err());
    }
}
