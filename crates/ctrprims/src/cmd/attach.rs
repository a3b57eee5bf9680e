use ctrprims_client::{AttachInput, AttachOptions};
use tokio::io::AsyncReadExt;

use crate::cmd::{client, failed, AttachArgs, GlobalArgs};
use crate::exit::{stream_error, CliResult, SUCCESS};
use crate::output::write_output;

pub async fn run(args: AttachArgs, globals: &GlobalArgs) -> CliResult<i32> {
    let client = client(globals)?;
    let containers = client.containers();
    let mode = containers
        .stream_mode(&args.container)
        .await
        .map_err(failed("attach"))?;

    let options = AttachOptions {
        stdin: !args.no_stdin,
        ..Default::default()
    };
    let session = containers
        .attach(&args.container, &options, mode)
        .await
        .map_err(failed("attach"))?;
    tracing::debug!(container = %args.container, ?mode, "attached");

    let (input, mut output) = session.split();
    let pump = (!args.no_stdin).then(|| tokio::spawn(forward_stdin(input.clone())));

    let mut interrupt = std::pin::pin!(tokio::signal::ctrl_c());
    let result = loop {
        tokio::select! {
            item = output.next() => match item {
                Some(Ok(chunk)) => write_output(&chunk),
                Some(Err(err)) => break Err(stream_error("attach", err)),
                None => break Ok(SUCCESS),
            },
            _ = &mut interrupt => {
                tracing::debug!("interrupted; detaching");
                break Ok(SUCCESS);
            }
        }
    };

    if let Some(pump) = pump {
        pump.abort();
    }
    if let Err(err) = input.close().await {
        tracing::debug!(error = %err, "session close failed");
    }
    result
}

async fn forward_stdin(input: AttachInput) {
    let mut stdin = tokio::io::stdin();
    let mut buf = vec![0u8; 8 * 1024];
    loop {
        match stdin.read(&mut buf).await {
            Ok(0) => {
                tracing::debug!("stdin closed");
                break;
            }
            Ok(n) => {
                if let Err(err) = input.write(&buf[..n]).await {
                    tracing::debug!(error = %err, "stopped forwarding stdin");
                    break;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to read stdin");
                break;
            }
        }
    }
}
