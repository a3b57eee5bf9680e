use ctrprims_client::LogsOptions;

use crate::cmd::{client, failed, GlobalArgs, LogsArgs};
use crate::exit::{stream_error, CliResult, SUCCESS};
use crate::output::write_output;

pub async fn run(args: LogsArgs, globals: &GlobalArgs) -> CliResult<i32> {
    let client = client(globals)?;
    let containers = client.containers();
    let mode = containers
        .stream_mode(&args.container)
        .await
        .map_err(failed("logs"))?;

    let options = LogsOptions {
        follow: args.follow,
        timestamps: args.timestamps,
        tail: args.tail,
        since: args.since,
        ..Default::default()
    };
    let mut output = containers
        .logs(&args.container, &options, mode)
        .await
        .map_err(failed("logs"))?;

    let mut interrupt = std::pin::pin!(tokio::signal::ctrl_c());
    loop {
        tokio::select! {
            item = output.next() => match item {
                Some(Ok(chunk)) => write_output(&chunk),
                Some(Err(err)) => return Err(stream_error("logs", err)),
                None => break,
            },
            _ = &mut interrupt => {
                tracing::debug!("interrupted; stopping log stream");
                output.cancel();
                break;
            }
        }
    }
    Ok(SUCCESS)
}
