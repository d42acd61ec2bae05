//! Field acquisition service (`acqsrv`)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use acqsrv::{AcqConfig, AcqService, LogTransport};

#[derive(Parser, Debug, Clone)]
#[command(name = "acqsrv", version, about = "Field acquisition service")]
struct Args {
    /// Configuration file (YAML, TOML or JSON)
    #[arg(short, long, env = "ACQSRV_CONFIG")]
    config: Option<PathBuf>,

    /// Log level, overrides the configured one
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration and exit
    #[arg(long)]
    validate: bool,

    /// Run a single cycle of each loop and exit
    #[arg(long)]
    once: bool,

    /// Execute one remote command (JSON) and print the reply
    #[arg(long, value_name = "JSON")]
    command: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AcqConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(level) = &args.log_level {
        config.log.level = level.clone();
    }
    let _log_guard = common::init_with_config(&config.log).context("initializing logging")?;

    info!(
        "acqsrv {} starting for machine {}",
        env!("CARGO_PKG_VERSION"),
        config.machine_type
    );

    if args.validate {
        let (runtime, configuration) = AcqService::validate(&config)?;
        info!(
            "Configuration valid: {} runtime, {} configuration measurements",
            runtime, configuration
        );
        return Ok(());
    }

    let mut service = AcqService::build(&config, Arc::new(LogTransport)).await?;

    if let Some(command) = &args.command {
        let reply = service.command_handler().handle(command).await;
        println!("{}", serde_json::to_string_pretty(&reply)?);
        return Ok(());
    }

    if args.once {
        let sent = service.run_once().await?;
        info!("Single cycle sent {} payloads", sent);
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        let received = common::wait_for_shutdown().await;
        info!("{} received, stopping after the current cycle", received);
        signal.cancel();
    });

    service.run(shutdown).await?;
    Ok(())
}
