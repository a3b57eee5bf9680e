use ctrprims_client::ContainerListOptions;

use crate::cmd::{client, failed, filters, GlobalArgs, PsArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, print_table, short_id, OutputFormat};

pub async fn run(args: PsArgs, globals: &GlobalArgs, format: OutputFormat) -> CliResult<i32> {
    let options = ContainerListOptions {
        all: args.all,
        filters: filters(&args.filter),
        ..Default::default()
    };
    let containers = client(globals)?
        .containers()
        .list(&options)
        .await
        .map_err(failed("list containers"))?;

    match format {
        OutputFormat::Json => print_json(&containers),
        OutputFormat::Raw => {
            for container in &containers {
                println!("{}", container.id);
            }
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            let rows = containers
                .iter()
                .map(|c| {
                    vec![
                        short_id(&c.id),
                        c.display_name().to_string(),
                        c.image.clone(),
                        c.state.clone(),
                        c.status.clone(),
                    ]
                })
                .collect();
            print_table(&["CONTAINER ID", "NAME", "IMAGE", "STATE", "STATUS"], rows);
        }
    }
    Ok(SUCCESS)
}
