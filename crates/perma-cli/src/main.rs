use std::path::PathBuf;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use perma_cli::{describe_json, init_logging, run_demo, run_simulator, SimulatorConfig};
use perma_core::ServiceConfig;

fn cli() -> Command {
    Command::new("perma")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Content-addressed claim log and permanode resolution")
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML service configuration file"),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(Command::new("demo").about("Run a title/tag editing session and print the result"))
        .subcommand(
            Command::new("simulate")
                .about("Feed concurrent writers' claims to replicas in shuffled orders and check convergence")
                .arg(
                    Arg::new("writers")
                        .long("writers")
                        .default_value("4")
                        .value_parser(value_parser!(usize))
                        .help("Number of signing writers"),
                )
                .arg(
                    Arg::new("claims")
                        .long("claims")
                        .default_value("50")
                        .value_parser(value_parser!(usize))
                        .help("Claims generated per writer"),
                )
                .arg(
                    Arg::new("replicas")
                        .long("replicas")
                        .default_value("3")
                        .value_parser(value_parser!(usize))
                        .help("Independent replicas to compare"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Random seed for reproducibility"),
                ),
        )
        .subcommand(Command::new("describe-json").about("Print a describe response for the demo data as JSON"))
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<ServiceConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => Ok(ServiceConfig::default()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_logging(matches.get_flag("json"))?;
    let config = load_config(&matches)?;

    match matches.subcommand() {
        Some(("demo", _)) => {
            let run = run_demo(config).await?;
            for step in &run.steps {
                println!("- {step}");
            }
            println!();

            let response = run.service.describe(&[run.permanode]).await?;
            if let Some(view) = response.view(&run.permanode) {
                println!("Current state of {}:", run.permanode);
                for (attribute, values) in view.attributes() {
                    println!("  {attribute}: {}", values.join(", "));
                }
            }
        }
        Some(("simulate", args)) => {
            let sim = SimulatorConfig {
                seed: args.get_one::<u64>("seed").copied().unwrap_or(42),
                writers: args.get_one::<usize>("writers").copied().unwrap_or(4),
                claims_per_writer: args.get_one::<usize>("claims").copied().unwrap_or(50),
                replicas: args.get_one::<usize>("replicas").copied().unwrap_or(3),
                service: config,
            };

            let report = run_simulator(sim).await?;
            println!("{}", report.generate_text());
            if !report.passed() {
                std::process::exit(1);
            }
        }
        Some(("describe-json", _)) => {
            let (_, value) = describe_json(config).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        _ => {}
    }
    Ok(())
}
