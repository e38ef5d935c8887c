//! waypost - Service discovery and KV coordination client
//!
//! Entry point for the waypost application.

use clap::Parser;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use waypost::cli::Cli;
use waypost::error::exit_code;
use waypost::{Client, WaypostError};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on CLI flags
    if let Err(e) = init_logging(&cli) {
        eprintln!("Failed to initialize logging: {}", e);
        return ExitCode::from(exit_code::GENERAL_ERROR as u8);
    }

    // Execute the command
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

/// Initialize the tracing subscriber based on CLI options.
fn init_logging(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (level_str, _is_quiet) = cli.log_level();

    let level = match level_str {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .init();

    Ok(())
}

/// Main application logic.
fn run(cli: Cli) -> waypost::Result<()> {
    let config = cli.client_config();

    tracing::debug!(
        scheme = %config.scheme,
        host = %config.host,
        port = %config.port,
        "Connecting to agent"
    );

    let client = Client::new(&config)?;

    let runtime = tokio::runtime::Runtime::new().map_err(|e| {
        WaypostError::transport_with_source("Failed to create async runtime".to_string(), e)
    })?;

    runtime.block_on(async { waypost::commands::dispatch(&client, &cli).await })
}
