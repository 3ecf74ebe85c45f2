mod config;
mod error;
mod relay;
mod server;
mod signal;
mod telegram;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, BOT_TOKEN_ENV, CHAT_ID_ENV};
use crate::relay::Relay;
use crate::telegram::TelegramClient;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is the normal case in production.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,signal_relay=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Ok(path) = dotenv {
        info!("Loaded environment from {}", path.display());
    }

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("relay.toml"));

    if config_path.exists() {
        info!("Loading configuration from: {}", config_path.display());
    } else {
        info!(
            "No config file at {}, using defaults",
            config_path.display()
        );
    }
    let mut config = Config::load_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    config.apply_env();

    info!("Configuration loaded successfully");
    info!("  Bind address: {}", config.server.bind_address);
    info!("  Webhook path: {}", config.server.path);
    info!("  Telegram API: {}", config.telegram.api_base_url);
    info!("  Parse mode: {}", config.telegram.parse_mode);
    match config.telegram.timeout() {
        Some(timeout) => info!("  Outbound timeout: {}s", timeout.as_secs()),
        None => info!("  Outbound timeout: disabled"),
    }

    let client = TelegramClient::new(&config.telegram)?;
    let relay = Relay::from_config(&config, Arc::new(client));

    if !relay.has_credentials() {
        warn!(
            "{} or {} is not set; signals will be answered with a configuration error",
            BOT_TOKEN_ENV, CHAT_ID_ENV
        );
    }

    server::serve(Arc::new(relay), &config.server).await
}
