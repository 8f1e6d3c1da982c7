use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod config;
mod observability;

use config::Config;

#[derive(Parser)]
#[command(name = "relayd", version, about = "Relays new telemetry receivers to a live tracker")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, short, default_value = "relayd.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Follow the change feed and relay telemetry until the feed is lost
    Run,
    /// Load and validate the config file, then exit
    CheckConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        CliCommand::CheckConfig => {
            println!("{}: ok", cli.config.display());
            ExitCode::SUCCESS
        }
        CliCommand::Run => run(config),
    }
}

fn run(config: Config) -> ExitCode {
    // Sentry must be set up before the runtime starts its threads
    let _sentry = observability::init_logging(&config.common.logging);

    if let Some(metrics) = &config.common.metrics
        && let Err(e) = observability::init_metrics(metrics)
    {
        tracing::error!("{e}");
        return ExitCode::FAILURE;
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("could not start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!("starting relay");
    match rt.block_on(relay::run(config.relay)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("relay stopped: {e}");
            ExitCode::FAILURE
        }
    }
}
