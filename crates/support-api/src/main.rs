//! HTTP service for the support bot.
//!
//! Serves chat turns, checkout and payment callbacks to the transport
//! adapter, and runs the subscription scheduler and payment monitor in the
//! background until shutdown.

mod app;
mod config;
mod error;
mod routes;
mod state;
mod telegram;

use std::path::Path;
use std::sync::Arc;

use billing::{BillingConfig, SystemClock};
use chat_brain::{ChatBrain, ChatBrainConfig};
use database::Database;
use orchestrator::{load_persona, OrchestratorConfig};
use payment_rails::{
    InvoiceGateway, MixPayClient, MixPayConfig, TonCenterClient, TonCenterConfig, TransferFeed,
};
use telegram_client::{BotConfig, TelegramClient};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::app::Components;
use crate::config::Config;
use crate::telegram::TelegramChannel;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let billing = BillingConfig::from_env();
    info!(addr = %config.addr, "Starting support API");

    if let Some(parent) = config.database_path().and_then(|p| Path::new(p).parent()) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let db = Database::connect(&config.database_url).await?;
    db.migrate().await?;

    let brain_config = ChatBrainConfig::from_env()?;
    info!(provider = ?brain_config.provider, model = %brain_config.model, "Reply generator configured");
    let brain = ChatBrain::new(brain_config)?;

    let telegram = match &config.telegram_bot_token {
        Some(token) => {
            let mut bot = BotConfig::new(token.clone());
            if let Some(provider_token) = &config.payment_provider_token {
                bot = bot.with_provider_token(provider_token.clone());
            }
            Some(TelegramChannel::new(TelegramClient::new(bot)?))
        }
        None => {
            warn!("TELEGRAM_BOT_TOKEN not set, notices will only be logged");
            None
        }
    };

    let gateway: Option<Arc<dyn InvoiceGateway>> = match &config.mixpay_payee_id {
        Some(payee) => Some(Arc::new(MixPayClient::new(MixPayConfig::new(payee.clone()))?)),
        None => None,
    };

    let feed: Option<Arc<dyn TransferFeed>> = match &config.wallet_address {
        Some(address) => {
            let mut ton = TonCenterConfig::new(address.clone()).with_api_url(config.toncenter_api_url.clone());
            if let Some(key) = &config.toncenter_api_key {
                ton = ton.with_api_key(key.clone());
            }
            Some(Arc::new(TonCenterClient::new(ton)?))
        }
        None => None,
    };

    let service = Components {
        db: db.clone(),
        brain: Arc::new(brain),
        clock: Arc::new(SystemClock),
        persona: load_persona(),
        billing: billing.clone(),
        orchestrator: OrchestratorConfig::from_env(),
        telegram,
        notifier: None,
        gateway,
        feed,
        wallet_address: config.wallet_address.clone(),
        api_token: config.api_token.clone(),
    }
    .build();

    if config.api_token.is_none() {
        warn!("API_TOKEN not set, /v1 routes are unauthenticated");
    }

    let tasks = service.spawn_background(&billing);
    let app = routes::router(service.state);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "Support API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Stopping background tasks");
    tasks.shutdown(config.shutdown_grace).await;
    db.close().await;
    info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
