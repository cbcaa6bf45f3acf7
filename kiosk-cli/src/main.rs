//! Binary crate for the `weather-kiosk` launcher.
//!
//! This crate focuses on:
//! - Parsing CLI arguments and installing the log sink
//! - The interactive setup form
//! - Headless render targets that write each published frame to disk

use std::{fs::File, path::Path, sync::Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod console;
mod headless;

const DEFAULT_FILTER: &str = "weather_kiosk=info,kiosk_core=info";

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    init_tracing(cmd.log_file.as_deref())?;
    cmd.run().await
}

fn init_tracing(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    let (stderr_layer, file_layer) = match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create log file: {}", path.display()))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Mutex::new(file));
            (None, Some(layer))
        }
        None => (Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)), None),
    };

    tracing_subscriber::registry().with(filter).with(stderr_layer).with(file_layer).init();
    Ok(())
}
