use ctrprims_client::ImageListOptions;

use crate::cmd::{client, failed, filters, GlobalArgs, ImagesArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{human_size, print_json, print_table, short_id, OutputFormat};

pub async fn run(args: ImagesArgs, globals: &GlobalArgs, format: OutputFormat) -> CliResult<i32> {
    let options = ImageListOptions {
        all: args.all,
        filters: filters(&args.filter),
        ..Default::default()
    };
    let images = client(globals)?
        .images()
        .list(&options)
        .await
        .map_err(failed("list images"))?;

    match format {
        OutputFormat::Json => print_json(&images),
        OutputFormat::Raw => {
            for image in &images {
                println!("{}", image.id);
            }
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            let mut rows = Vec::new();
            for image in &images {
                let tags = if image.repo_tags.is_empty() {
                    vec!["<none>:<none>".to_string()]
                } else {
                    image.repo_tags.clone()
                };
                for tag in tags {
                    rows.push(vec![tag, short_id(&image.id), human_size(image.size)]);
                }
            }
            print_table(&["REPOSITORY:TAG", "IMAGE ID", "SIZE"], rows);
        }
    }
    Ok(SUCCESS)
}
