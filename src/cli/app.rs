use clap::Parser;
use tracing::{error, info};

use super::context::CliContext;
use super::dispatch::dispatch;
use super::env::CliArgs;
use super::runtime::init_logging;
use crate::config::{load_config, LoadedConfig};
use crate::report::EXIT_SETUP;

/// Parse arguments, run the command and return the process exit code.
pub async fn run() -> i32 {
    let cli = CliArgs::parse();

    if let Err(err) = init_logging(&cli.log_level, cli.debug, cli.log_json) {
        eprintln!("Error: {err:#}");
        return EXIT_SETUP;
    }

    info!("Starting runebattle-e2e v{}", env!("CARGO_PKG_VERSION"));

    let loaded = match load_config(cli.config.as_ref()).await {
        Ok(loaded) => loaded,
        Err(err) => {
            error!("Configuration failed: {:#}", err);
            eprintln!("Error: {err:#}");
            return EXIT_SETUP;
        }
    };
    let LoadedConfig {
        config,
        path,
        from_file,
    } = loaded;
    let ctx = CliContext::new(config, path, from_file, cli.output.clone(), cli.report.clone());

    match dispatch(&cli, &ctx).await {
        Ok(code) => {
            info!(exit_code = code, "Command completed");
            code
        }
        Err(err) => {
            error!("Command failed: {:#}", err);
            eprintln!("Error: {err:#}");
            EXIT_SETUP
        }
    }
}
