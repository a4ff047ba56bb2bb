use anyhow::{bail, Context, Result};
use artifact_core::ArtifactRegistry;
use artifact_stream::StreamConfig;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod simulate;

use simulate::Scenario;

fn cli() -> Command {
    Command::new("artifacts")
        .version(artifact_stream::VERSION)
        .about("Stream typed artifacts and inspect their schemas")
        .subcommand_required(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .help("Log filter used when RUST_LOG is unset (e.g. debug, artifact_stream=trace)"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("simulate")
                .about("Stream a scripted plan and its tool results into an in-memory store")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("TOML stream configuration"),
                )
                .arg(
                    Arg::new("container")
                        .long("container")
                        .default_value("simulation")
                        .help("Container the artifacts are grouped under"),
                )
                .arg(
                    Arg::new("objective")
                        .long("objective")
                        .default_value("Collect prices from three vendors")
                        .help("Objective written to the plan"),
                )
                .arg(
                    Arg::new("steps")
                        .long("steps")
                        .default_value("3")
                        .value_parser(value_parser!(u32))
                        .help("Number of plan steps"),
                )
                .arg(
                    Arg::new("fail-step")
                        .long("fail-step")
                        .value_parser(value_parser!(u32))
                        .help("Fail the plan at this 1-based step"),
                )
                .arg(
                    Arg::new("queued")
                        .long("queued")
                        .action(ArgAction::SetTrue)
                        .help("Route writes through a background channel"),
                ),
        )
        .subcommand(
            Command::new("schema")
                .about("Print the JSON schema of an artifact kind")
                .arg(Arg::new("kind").required(true).help("Kind name, e.g. execution_plan")),
        )
        .subcommand(Command::new("kinds").about("List registered artifact kinds"))
}

fn init_tracing(matches: &ArgMatches) {
    let level = matches
        .get_one::<String>("log-level")
        .map_or("info", String::as_str);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if matches.get_flag("json") {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<StreamConfig> {
    let Some(path) = path else {
        return Ok(StreamConfig::default());
    };
    let config = StreamConfig::load(path)
        .with_context(|| format!("loading stream config from {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(&matches);

    match matches.subcommand() {
        Some(("simulate", args)) => {
            let config = load_config(args.get_one::<PathBuf>("config"))?;
            let scenario = Scenario {
                container: args
                    .get_one::<String>("container")
                    .cloned()
                    .unwrap_or_default(),
                objective: args
                    .get_one::<String>("objective")
                    .cloned()
                    .unwrap_or_default(),
                steps: args.get_one::<u32>("steps").copied().unwrap_or(3),
                fail_step: args.get_one::<u32>("fail-step").copied(),
                queued: args.get_flag("queued"),
            };
            info!(?scenario, "starting simulation");
            let store = simulate::run(&scenario, &config).await?;
            println!("{}", serde_json::to_string_pretty(&store)?);
        }
        Some(("schema", args)) => {
            let kind = args
                .get_one::<String>("kind")
                .map(String::as_str)
                .unwrap_or_default();
            let registry = ArtifactRegistry::with_defaults()?;
            let Some(info) = registry.info(kind) else {
                let known: Vec<_> = registry.kinds().map(|k| k.kind).collect();
                bail!("unknown kind {kind:?}, expected one of {}", known.join(", "));
            };
            println!("{}", serde_json::to_string_pretty(&info.schema)?);
        }
        Some(("kinds", _)) => {
            let registry = ArtifactRegistry::with_defaults()?;
            for info in registry.kinds() {
                println!("{} v{}", info.kind, info.version);
            }
        }
        _ => {}
    }
    Ok(())
}
