//! Home Assistant Rust Server
//!
//! Loads `configuration.yaml`, imports the configured 17Track accounts,
//! sets them up and runs until interrupted.

mod bootstrap;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use ha_components::seventeen_track::HttpClientFactory;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use crate::bootstrap::{bootstrap, Configuration};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "homeassistant")]
#[command(version, about = "Home Assistant (Rust) with 17Track package tracking")]
struct Args {
    /// Directory holding configuration.yaml
    #[arg(long = "config", short = 'c', env = "HA_CONFIG_DIR", default_value = "./config")]
    config_dir: PathBuf,
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(filter).with_target(true).finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let args = Args::parse();

    info!("Starting Home Assistant (Rust)");
    let config = Configuration::load(&args.config_dir)?;
    let http = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
    let hass = bootstrap(config, Arc::new(HttpClientFactory::new(http)))?;

    hass.config_entries.setup_all().await;
    info!(
        "Home Assistant is running with {} config entries",
        hass.config_entries.len()
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    hass.config_entries.unload_all().await;

    Ok(())
}
