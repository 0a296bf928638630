//! Skycast Server
//!
//! Run with: cargo run --bin skycast
//!
//! # Configuration
//!
//! Read from `--config`, the default config locations or built-in defaults,
//! then overridden by environment variables (a `.env` file is honored):
//! - `API_KEY`: Weather API credential (required)
//! - `SKYCAST_HOST`, `SKYCAST_PORT`: Address to bind (default: 0.0.0.0:8000)
//! - `SKYCAST_LOCATION`: Initial location (default: Phnom Penh)
//! - `SKYCAST_STATIC_DIR`: Dashboard assets to serve
//! - `SKYCAST_LOG_LEVEL`, `SKYCAST_LOG_FORMAT`: Logging
//! - `RUST_LOG`: Overrides the log filter entirely

use anyhow::{bail, Context};
use clap::Parser;
use skycast::api::{serve, AppState};
use skycast::config::{Config, LoggingConfig};
use skycast::location::TargetLocation;
use skycast::publisher::{LatestWeather, UpdatePublisher};
use skycast::weather::WeatherClient;
use skycast::websocket::SubscriberRegistry;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "skycast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Live weather dashboard server")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Initial location to publish
    #[arg(short, long)]
    location: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let mut config = Config::load_with_env(args.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(location) = args.location {
        config.publisher.location = location;
    }

    init_tracing(&config.logging);

    tracing::info!("Starting Skycast v{}", env!("CARGO_PKG_VERSION"));

    if !config.weather.has_api_key() {
        bail!("API_KEY is not set; the weather API cannot be queried without it");
    }

    let target = TargetLocation::new(&config.publisher.location)
        .context("Invalid initial location")?;
    tracing::info!(location = %target.name(), "Initial location");

    let registry = Arc::new(SubscriberRegistry::new(config.registry_config(), target));
    let source = Arc::new(WeatherClient::new(config.weather_client_config())?);
    let latest = LatestWeather::default();
    let shutdown = CancellationToken::new();

    let publisher = UpdatePublisher::new(
        source,
        Arc::clone(&registry),
        latest.clone(),
        config.publisher_config(),
    )
    .start(shutdown.child_token());

    // Bring the server down with the publisher
    let watchdog = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let result = publisher.await;
            shutdown.cancel();
            result
        })
    };

    let state = AppState::new(
        config.server.clone(),
        registry,
        latest,
        config.session_config(),
        shutdown.clone(),
    );
    serve(state, &config.server).await?;

    watchdog
        .await
        .context("Publisher watchdog panicked")?
        .context("Publisher task panicked")?
        .context("Weather publisher failed")?;

    tracing::info!("Skycast shutdown complete");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("skycast={},tower_http={}", logging.level, logging.level).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
