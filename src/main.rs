use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod api;
mod bot;
mod config;
mod error;
mod models;
mod orders;
mod tracking;

use crate::api::dexscreener::DexScreenerClient;
use crate::bot::format::PostStyle;
use crate::bot::notification::NotificationManager;
use crate::config::Config;
use crate::orders::OrderDesk;
use crate::tracking::TokenMonitor;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables first so RUST_LOG from .env reaches the filter
    dotenv().ok();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = Arc::new(Config::load().context("Failed to load configuration")?);
    info!(
        "Configuration loaded: {} networks, {} packages, {} admins",
        config.market.networks.len(),
        config.market.packages.len(),
        config.admin_ids.len()
    );

    let dex_client = Arc::new(DexScreenerClient::new(
        &config.dexscreener_base_url,
        Duration::from_secs(config.http_timeout_secs),
    )?);
    info!("DexScreener client initialized for {}", config.dexscreener_base_url);

    let bot = Bot::new(&config.telegram_bot_token);
    let notification_manager = Arc::new(NotificationManager::new(bot.clone(), config.admin_ids.clone()));
    let style = PostStyle::new(&config.market, &config.post_footer);

    let (monitor, monitor_task) = TokenMonitor::new(
        config.monitor.clone(),
        dex_client.clone(),
        notification_manager.clone(),
        style.clone(),
        config.broadcast_chat_id,
    )
    .spawn();

    let orders = OrderDesk::new(
        dex_client.clone(),
        notification_manager.clone(),
        monitor.clone(),
        style.clone(),
        config.market.clone(),
        config.broadcast_chat_id,
    );

    let state = bot::BotState {
        config: config.clone(),
        dex_client,
        monitor: monitor.clone(),
        orders,
        notification_manager,
        style,
    };

    info!("Starting Hot Pairs bot...");
    bot::start_bot(bot, Arc::new(state)).await?;

    monitor.shutdown();
    if let Err(e) = monitor_task.await {
        error!("Token monitor task ended abnormally: {}", e);
    }
    info!("Shutdown complete");

    Ok(())
}
