use serde::Serialize;

use crate::cmd::{client, failed, GlobalArgs, VersionArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct EngineVersion {
    version: String,
    api_version: String,
    min_api_version: String,
    os: String,
    arch: String,
}

#[derive(Serialize)]
struct VersionOutput {
    name: &'static str,
    version: &'static str,
    target: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    engine: Option<EngineVersion>,
}

pub async fn run(args: VersionArgs, globals: &GlobalArgs, format: OutputFormat) -> CliResult<i32> {
    let engine = if args.engine {
        let version = client(globals)?
            .system()
            .version()
            .await
            .map_err(failed("engine version"))?;
        Some(EngineVersion {
            version: version.version,
            api_version: version.api_version,
            min_api_version: version.min_api_version,
            os: version.os,
            arch: version.arch,
        })
    } else {
        None
    };

    let out = VersionOutput {
        name: "ctrprims",
        version: env!("CARGO_PKG_VERSION"),
        target: option_env!("CTRPRIMS_BUILD_TARGET").unwrap_or("unknown"),
        engine,
    };

    if format == OutputFormat::Json {
        print_json(&out);
        return Ok(SUCCESS);
    }

    println!("{} {}", out.name, out.version);
    if args.extended {
        println!("target: {}", out.target);
        println!("target_os: {}", std::env::consts::OS);
        println!("target_arch: {}", std::env::consts::ARCH);
        println!("rustc: {}", option_env!("RUSTC_VERSION").unwrap_or("unknown"));
        println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    }
    if let Some(engine) = &out.engine {
        println!(
            "engine: {} (api {}, min api {}, {}/{})",
            engine.version, engine.api_version, engine.min_api_version, engine.os, engine.arch
        );
    }

    Ok(SUCCESS)
}
