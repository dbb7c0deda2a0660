//! ShutterLink operator entry point.

mod config;
mod console;

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shutterlink_core::OperatorCore;

use crate::config::OperatorConfig;

/// Remote capture control and image download over a WebSocket relay.
#[derive(Debug, Parser)]
#[command(name = "shutterlink-operator", version, about)]
struct Args {
    /// Configuration file (default: platform config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Relay URL, overriding the configuration file
    #[arg(long)]
    url: Option<String>,

    /// Directory for downloaded archives, overriding the configuration file
    #[arg(long)]
    save_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout belongs to the console.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting ShutterLink operator"
    );

    let path = args.config.unwrap_or_else(config::config_path);
    let mut operator_config = match OperatorConfig::load_from(&path) {
        Ok(c) => {
            tracing::info!(path = %path.display(), "configuration loaded");
            c
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            OperatorConfig::default()
        }
    };
    if let Some(url) = args.url {
        operator_config.relay_url = url;
    }
    if let Some(dir) = args.save_dir {
        operator_config.save_dir = dir;
    }

    let (core, handle, events) = OperatorCore::new(operator_config.to_core());
    let core_task = tokio::spawn(core.run());

    let result = console::run(handle, events).await;
    core_task.await?;
    result
}
