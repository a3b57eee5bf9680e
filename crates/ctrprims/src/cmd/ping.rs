use std::time::Instant;

use serde::Serialize;

use crate::cmd::{client, failed, GlobalArgs, PingArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct PingOutput {
    endpoint: String,
    response: String,
    latency_ms: f64,
}

pub async fn run(_args: PingArgs, globals: &GlobalArgs, format: OutputFormat) -> CliResult<i32> {
    let client = client(globals)?;
    let start = Instant::now();
    let response = client.system().ping().await.map_err(failed("ping"))?;
    let latency_ms = (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;

    let out = PingOutput {
        endpoint: client.describe(),
        response: response.trim().to_string(),
        latency_ms,
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Raw => println!("{}", out.response),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("{} from {} in {:.2}ms", out.response, out.endpoint, out.latency_ms);
        }
    }
    Ok(SUCCESS)
}
