use ctrprims_client::models::EventMessage;
use ctrprims_client::EventsOptions;

use crate::cmd::{client, failed, filters, EventsArgs, GlobalArgs};
use crate::exit::{stream_error, CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

pub async fn run(args: EventsArgs, globals: &GlobalArgs, format: OutputFormat) -> CliResult<i32> {
    let options = EventsOptions {
        since: args.since,
        until: args.until,
        filters: filters(&args.filter),
    };
    let mut events = client(globals)?
        .system()
        .events(&options)
        .await
        .map_err(failed("events"))?;

    let mut seen = 0usize;
    let mut interrupt = std::pin::pin!(tokio::signal::ctrl_c());
    while args.count.map_or(true, |limit| seen < limit) {
        tokio::select! {
            item = events.next() => match item {
                Some(Ok(event)) => {
                    seen += 1;
                    match format {
                        OutputFormat::Json | OutputFormat::Raw => print_json(&event),
                        OutputFormat::Table | OutputFormat::Pretty => println!(
                            "{} {} {} {}",
                            event.time,
                            event.kind,
                            event.action,
                            actor_label(&event)
                        ),
                    }
                }
                Some(Err(err)) => return Err(stream_error("events", err)),
                None => break,
            },
            _ = &mut interrupt => break,
        }
    }
    events.cancel();
    Ok(SUCCESS)
}

/// The actor's name attribute when the engine supplies one, else its id.
fn actor_label(event: &EventMessage) -> &str {
    event
        .actor
        .attributes
        .get("name")
        .filter(|name| !name.is_empty())
        .map_or(event.actor.id.as_str(), String::as_str)
}
