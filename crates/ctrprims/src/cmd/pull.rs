use ctrprims_client::{ClientError, ProgressMessage, PullOptions, RegistryAuth};
use serde::Serialize;

use crate::cmd::{client, failed, GlobalArgs, PullArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct PullOutput<'a> {
    image: &'a str,
    digest: &'a str,
}

pub async fn run(args: PullArgs, globals: &GlobalArgs, format: OutputFormat) -> CliResult<i32> {
    let options = PullOptions {
        platform: args.platform.clone(),
        auth: args.registry_auth.clone().map(RegistryAuth::new),
        ..Default::default()
    };

    let mut stream = client(globals)?
        .images()
        .pull(&args.image, &options)
        .await
        .map_err(failed("pull"))?;

    while let Some(item) = stream.next().await {
        match item {
            Ok(message) if !args.quiet => progress(&message, format),
            Ok(_) => {}
            Err(err @ ClientError::Decode { .. }) => {
                tracing::debug!(error = %err, "skipping undecodable progress record")
            }
            Err(err) => return Err(client_error("pull", err)),
        }
    }

    let result = stream.finish().await.map_err(failed("pull"))?;
    tracing::info!(image = %args.image, digest = %result.digest, "pull complete");

    if args.quiet || format == OutputFormat::Raw {
        println!("{}", result.digest);
    } else if format == OutputFormat::Json {
        print_json(&PullOutput {
            image: &args.image,
            digest: &result.digest,
        });
    } else {
        println!("Digest: {}", result.digest);
    }
    Ok(SUCCESS)
}

/// Progress goes to stderr unless the caller asked for JSON records.
fn progress(message: &ProgressMessage, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(message),
        OutputFormat::Raw => {}
        OutputFormat::Table | OutputFormat::Pretty => {
            let status = message.status.as_deref().unwrap_or_default();
            match (&message.id, &message.progress) {
                (Some(id), Some(bar)) => eprintln!("{id}: {status} {bar}"),
                (Some(id), None) => eprintln!("{id}: {status}"),
                (None, _) => eprintln!("{status}"),
            }
        }
    }
}
