//! Skycast CLI
//!
//! Command-line companion for Skycast:
//! - Fetch current weather once
//! - Change the location a running server publishes
//! - Generate a config file

use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use skycast::config::{generate_default_config, Config};
use skycast::weather::{render_update, WeatherClient, WeatherSource};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "skycast-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line companion for the Skycast weather dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Server URL
    #[arg(long, default_value = "http://localhost:8000", global = true)]
    pub server_url: String,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch current weather for a location once
    Fetch {
        /// Location name, e.g. "Phnom Penh"
        city: String,
        /// Print the dashboard fragment instead of JSON
        #[arg(long)]
        html: bool,
    },

    /// Change the location a running server publishes
    UpdateCity {
        /// New location name
        city: String,
    },

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Fetch { city, html } => {
            let config = Config::load_with_env(cli.config.as_deref())
                .context("Failed to load configuration")?;
            let client = WeatherClient::new(config.weather_client_config())?;

            let snapshot = client
                .fetch(city.trim())
                .await
                .with_context(|| format!("Failed to fetch weather for {}", city.trim()))?;

            if html {
                print!("{}", render_update(&snapshot, &Local::now()));
            } else {
                println!("{}", serde_json::to_string_pretty(&snapshot)?);
            }
        }

        Commands::UpdateCity { city } => {
            let client = reqwest::Client::new();
            let response = client
                .post(format!("{}/update-city", cli.server_url))
                .form(&[("city", city.as_str())])
                .send()
                .await
                .with_context(|| format!("Cannot connect to Skycast at {}", cli.server_url))?;

            if response.status().is_success() {
                println!("Now publishing weather for {}", city.trim());
            } else {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                eprintln!("Update failed ({}): {}", status, text);
                std::process::exit(1);
            }
        }

        Commands::Config { output } => {
            let config = generate_default_config();

            match output {
                Some(path) => {
                    // Create parent directory if needed
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent)?;
                    }
                    std::fs::write(&path, &config)?;
                    println!("Config written to {:?}", path);
                }
                None => {
                    print!("{}", config);
                }
            }
        }
    }

    Ok(())
}
