// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stratamon: one-shot printer status fetch.
//
// Builds a `PrinterConfig` from an optional TOML file and command-line
// flags (flags win), fetches the status file once and prints it as JSON.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;

use stratamon_core::config::PrinterConfig;
use stratamon_core::error::{Result, StratamonError};
use stratamon_core::human_errors::humanize_error;
use stratamon_protocol::Fetcher;

#[derive(Parser, Debug)]
#[command(name = "stratamon")]
#[command(about = "Fetch a Stratasys printer's status file and print it as JSON")]
#[command(version)]
struct Cli {
    /// TOML file holding a printer configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Printer host name or address
    #[arg(long)]
    host: Option<String>,

    /// Status service port
    #[arg(short, long)]
    port: Option<u16>,

    /// Attempts before giving up
    #[arg(long)]
    attempts: Option<u32>,

    /// Pause between attempts, in milliseconds
    #[arg(long)]
    retry_delay_ms: Option<u64>,

    /// Connect timeout, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Name of the status file to request
    #[arg(long)]
    status_file: Option<String>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn read_config_file(path: &Path) -> Result<PrinterConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| {
        StratamonError::InvalidConfig(format!("{}: {}", path.display(), e))
    })
}

/// File values first, then any flag that was given.
fn load_config(cli: &Cli) -> Result<PrinterConfig> {
    let mut config = match &cli.config {
        Some(path) => read_config_file(path)?,
        None if cli.host.is_none() => {
            return Err(StratamonError::InvalidConfig(
                "no printer host given (use --host or --config)".into(),
            ));
        }
        None => PrinterConfig::default(),
    };

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(attempts) = cli.attempts {
        config.retry_attempts = attempts;
    }
    if let Some(ms) = cli.retry_delay_ms {
        config.retry_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = cli.timeout_ms {
        config.connect_timeout = Duration::from_millis(ms);
    }
    if let Some(name) = &cli.status_file {
        config.status_filename = name.clone();
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli) -> Result<String> {
    let config = load_config(cli)?;
    tracing::info!(addr = %config.address(), "fetching printer status");

    let status = Fetcher::tcp(config).fetch_status().await?;
    let json = if cli.pretty {
        serde_json::to_string_pretty(&status)?
    } else {
        serde_json::to_string(&status)?
    };
    Ok(json)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let human = humanize_error(&e);
            eprintln!("error: {}", human.message);
            eprintln!("  {}", human.suggestion);
            tracing::debug!(error = %e, "status fetch failed");
            ExitCode::FAILURE
        }
    }
}
