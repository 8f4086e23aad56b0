//! Relay runtime: translates stdin to stdout through an embedded
//! request/reply relay.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info, warn};

use relay_runtime::{stdin_reader, RelayConfig, RelayRuntime};
use relay_telemetry::{init_logging, TelemetryConfig};

/// Request/reply relay over an embedded topic broker
#[derive(Parser, Debug)]
#[command(name = "relay-runtime")]
#[command(about = "Send each stdin line as a request and print the correlated reply")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reply timeout in milliseconds (overrides file and environment)
    #[arg(short, long)]
    timeout_ms: Option<u64>,

    /// Emit JSON logs on stderr
    #[arg(long)]
    json_logs: bool,
}

fn load_config(args: &Args) -> Result<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => RelayConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => RelayConfig::default(),
    };

    config
        .apply_env()
        .context("Invalid environment override")?;

    if let Some(timeout_ms) = args.timeout_ms {
        config.requestor.reply_timeout_ms = timeout_ms;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let mut telemetry = TelemetryConfig::from_env();
    if args.json_logs {
        telemetry = telemetry.with_json_logs(true);
    }
    init_logging(&telemetry).context("Failed to initialize logging")?;

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Exiting program.");
            return Err(e);
        }
    };

    let runtime = match RelayRuntime::start(&config).await {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %format!("{e:#}"), "Exiting program.");
            return Err(e);
        }
    };

    info!("### Ready to process requests. Waiting for input lines. ###");
    let stdin = match stdin_reader() {
        Ok(reader) => BufReader::new(reader),
        Err(e) => {
            error!(error = %e, "Exiting program.");
            runtime.shutdown().await;
            return Err(anyhow::Error::new(e).context("Failed to start input reader"));
        }
    };
    let stdout = tokio::io::stdout();

    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    match runtime.serve(stdin, stdout, interrupted).await {
        Ok(_) => Ok(()),
        Err(e) => {
            error!(error = %e, "Exiting program.");
            Err(anyhow::Error::new(e).context("Request processing failed"))
        }
    }
}
