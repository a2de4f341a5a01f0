mod compose;
mod config;
mod extract;
mod platform;
mod registry;
mod watcher;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::platform::twitter::{self, TwitterClient};
use crate::registry::RegistryClient;
use crate::watcher::Watcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,bikewatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Credentials may live in a .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Account: @{}", config.twitter.handle);
    info!("  Registry: {}", config.registry.base_url);
    info!("  Poll interval: {}s", config.twitter.poll_interval_secs);

    let registry = RegistryClient::new(config.registry.clone());
    let watcher = Arc::new(Watcher::new(
        registry,
        config.reply.clone(),
        config.twitter.handle.clone(),
    ));
    let client = TwitterClient::new(config.twitter.clone());
    let poll_interval = Duration::from_secs(config.twitter.poll_interval_secs);

    info!("Bot is starting...");
    twitter::run(client, watcher, poll_interval).await
}
