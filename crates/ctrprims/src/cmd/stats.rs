use ctrprims_client::models::ContainerStats;
use ctrprims_client::StatsOptions;

use crate::cmd::{client, failed, GlobalArgs, StatsArgs};
use crate::exit::{stream_error, CliResult, SUCCESS};
use crate::output::{human_size, print_json, print_table, OutputFormat};

pub async fn run(args: StatsArgs, globals: &GlobalArgs, format: OutputFormat) -> CliResult<i32> {
    let client = client(globals)?;
    let containers = client.containers();

    if args.no_stream {
        let sample = containers
            .stats_once(&args.container)
            .await
            .map_err(failed("stats"))?;
        render(&args.container, &sample, format);
        return Ok(SUCCESS);
    }

    let mut samples = containers
        .stats(&args.container, &StatsOptions::default())
        .await
        .map_err(failed("stats"))?;

    let mut interrupt = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            item = samples.next() => match item {
                Some(Ok(sample)) => render(&args.container, &sample, format),
                Some(Err(err)) => return Err(stream_error("stats", err)),
                None => break,
            },
            _ = &mut interrupt => {
                samples.cancel();
                break;
            }
        }
    }
    Ok(SUCCESS)
}

fn percent(value: Option<f64>) -> String {
    value.map_or_else(|| "--".to_string(), |v| format!("{v:.2}%"))
}

fn render(container: &str, sample: &ContainerStats, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(sample),
        OutputFormat::Raw => println!(
            "{} {} {}",
            container,
            percent(sample.cpu_percent()),
            percent(sample.memory_percent())
        ),
        OutputFormat::Table | OutputFormat::Pretty => {
            let memory = sample.memory_stats.usage.unwrap_or_default() as i64;
            print_table(
                &["CONTAINER", "CPU %", "MEM USAGE", "MEM %"],
                vec![vec![
                    container.to_string(),
                    percent(sample.cpu_percent()),
                    human_size(memory),
                    percent(sample.memory_percent()),
                ]],
            );
        }
    }
}
