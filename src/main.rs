use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use yearzip::archive::Orchestrator;
use yearzip::cli::Cli;
use yearzip::config::Config;
use yearzip::scheduler::{Scheduler, Shutdown};
use yearzip::{logging, platform, report};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let Some(config_path) = cli.config.clone().or_else(platform::default_config_path) else {
        eprintln!("could not determine a config directory, pass --config");
        return ExitCode::FAILURE;
    };

    let config = match Config::load(&config_path) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            eprintln!("error loading {}: {e}", config_path.display());
            return ExitCode::FAILURE;
        }
    };
    info!(config = %config_path.display(), directories = config.directories.len(), "configuration loaded");

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                signal_token.cancel();
            }
            Err(e) => error!(error = %e, "could not listen for ctrl-c"),
        }
    });

    let orchestrator = Orchestrator::new(Arc::clone(&config));

    if cli.once {
        let token = cancel.clone();
        return match tokio::task::spawn_blocking(move || orchestrator.run_pass(&token)).await {
            Ok(pass) => {
                report::print(&pass, cli.json);
                if pass.failures() > 0 {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                }
            }
            Err(e) => {
                error!(error = %e, "scan pass crashed");
                ExitCode::FAILURE
            }
        };
    }

    let scheduler = Scheduler::new(config.interval);
    match scheduler.run(cancel, move |token| orchestrator.run_pass(&token)).await {
        Shutdown::Cancelled => ExitCode::SUCCESS,
        Shutdown::Fatal(_) => ExitCode::FAILURE,
    }
}
