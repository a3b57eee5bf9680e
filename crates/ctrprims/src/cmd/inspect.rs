use serde::Serialize;

use crate::cmd::{client, failed, GlobalArgs, InspectArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, print_pretty_json, OutputFormat};

pub async fn run(args: InspectArgs, globals: &GlobalArgs, format: OutputFormat) -> CliResult<i32> {
    let client = client(globals)?;
    if args.image {
        let image = client
            .images()
            .inspect(&args.target)
            .await
            .map_err(failed("inspect image"))?;
        render(&image, format);
    } else {
        let container = client
            .containers()
            .inspect(&args.target)
            .await
            .map_err(failed("inspect container"))?;
        render(&container, format);
    }
    Ok(SUCCESS)
}

fn render<T: Serialize>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => print_json(value),
        OutputFormat::Table | OutputFormat::Pretty => print_pretty_json(value),
    }
}
