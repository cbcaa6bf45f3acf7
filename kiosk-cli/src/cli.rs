use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;

use kiosk_core::{
    ConfigurationGate, GateDecision, Kiosk, KioskConfig, KioskContext, KioskError, KioskEvent,
    SetupPrefill, WeatherProvider,
    compose::Composer,
    fonts::FontSet,
    icons::IconCache,
    provider::{OneCallProvider, ZippopotamGeocoder},
    settings::{SettingsStore, TomlSettingsStore, keys},
};

use crate::{console, headless::{self, HeadlessTargets}};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-kiosk", version, about = "Always-on weather display")]
pub struct Cli {
    /// Path to kiosk.toml; defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to this file instead of stderr.
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the display loop, writing every published frame to a directory.
    Run {
        /// Where display.png and display.txt are written.
        #[arg(long, default_value = "frames")]
        output: PathBuf,
    },

    /// Enter the API key and location without starting the display.
    Configure,

    /// Run a single refresh cycle and print what the display would show.
    Show,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_path = match self.config {
            Some(path) => path,
            None => KioskConfig::config_file_path()?,
        };
        let config = KioskConfig::load_from(&config_path)?;

        match self.command {
            Command::Run { output } => run_kiosk(config, output).await,
            Command::Configure => configure(config, &config_path).await,
            Command::Show => show(config).await,
        }
    }
}

fn open_settings(config: &KioskConfig) -> Result<TomlSettingsStore> {
    let path = config.resolved_settings_path()?;
    TomlSettingsStore::open(path.clone())
        .with_context(|| format!("Settings store unusable: {}", path.display()))
}

fn geocoder(config: &KioskConfig) -> Result<ZippopotamGeocoder> {
    let geocoder = ZippopotamGeocoder::new(&config.provider.geocode_url, config.fetch_timeout())?;
    Ok(geocoder)
}

fn provider(config: &KioskConfig) -> Result<OneCallProvider> {
    let endpoint = &config.provider.onecall_url;
    Ok(OneCallProvider::new(endpoint, config.units, config.fetch_timeout())?)
}

async fn run_kiosk(config: KioskConfig, output: PathBuf) -> Result<()> {
    info!("Initializing weather kiosk...");

    let settings = open_settings(&config)?;
    let provider = provider(&config)?;
    let geocoder = geocoder(&config)?;
    let targets = HeadlessTargets::create(output)?;

    let (tx, rx) = mpsc::channel(32);
    let setup = console::spawn(tx.clone());

    let kiosk = Kiosk::new(KioskContext {
        icons: IconCache::new(&config.asset_dir),
        fonts: FontSet::load(&config.asset_dir),
        config,
        settings: Box::new(settings),
        provider: Arc::new(provider),
        geocoder: Arc::new(geocoder),
        targets: Box::new(targets),
        setup: Box::new(setup),
    });

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(KioskEvent::Shutdown).await;
        }
    });

    kiosk.run(rx).await?;
    Ok(())
}

async fn configure(config: KioskConfig, config_path: &Path) -> Result<()> {
    if !config_path.exists() {
        config.save_to(config_path)?;
        println!("Wrote default configuration to {}", config_path.display());
    }

    let mut settings = open_settings(&config)?;
    let mut gate = ConfigurationGate::new(Arc::new(geocoder(&config)?));

    let mut prefill = match gate.startup(&settings) {
        GateDecision::Ready(credentials) => SetupPrefill {
            api_key: credentials.api_key,
            zip_code: settings.get(keys::ZIP_CODE).unwrap_or_default(),
        },
        GateDecision::NeedsSetup(prefill) => prefill,
    };

    loop {
        let Some(submission) = console::prompt_submission(&prefill)? else {
            println!("Setup cancelled; nothing saved.");
            return Ok(());
        };
        prefill = console::prefill_from(&submission);

        match gate.submit(&mut settings, submission).await {
            Ok(outcome) => {
                let place = outcome
                    .credentials
                    .location
                    .display_name()
                    .unwrap_or_else(|| "coordinates".to_string());
                println!("Saved {place}.");
                return Ok(());
            }
            // Shown to the user; nothing was persisted, so ask again.
            Err(e @ (KioskError::GeocodeFailure(_) | KioskError::ConfigIncomplete(_))) => {
                eprintln!("Error: {e}");
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn show(config: KioskConfig) -> Result<()> {
    let settings = open_settings(&config)?;
    let mut gate = ConfigurationGate::new(Arc::new(geocoder(&config)?));

    let credentials = match gate.startup(&settings) {
        GateDecision::Ready(credentials) => credentials,
        GateDecision::NeedsSetup(_) => bail!(
            "No location configured.\n\
             Hint: run `weather-kiosk configure` and enter your API key and Zip Code."
        ),
    };

    let snapshot = provider(&config)?
        .fetch(&credentials)
        .await
        .context("Weather update failed")?;

    let mut composer = Composer::new(
        IconCache::new(&config.asset_dir),
        FontSet::load(&config.asset_dir),
        config.units,
    );
    let artifacts = composer.compose(&snapshot, &credentials, &chrono::Local::now());

    print!("{}", headless::describe(&artifacts));
    Ok(())
}
