//! CRON job monitor: entry point.
//!
//! Starts a background poller that reads the owner wallet's extensions and
//! DNS items from toncenter, decodes every renewal job and persists snapshots
//! to SQLite. Simultaneously exposes a small Axum REST API over them.

mod api;
mod config;
mod db;
mod errors;
mod poller;
mod rpc;
mod snapshot;

use std::sync::Arc;

use axum::{routing::get, Router};
use reqwest::Client;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;
use poller::PollerState;
use rpc::TonCenterClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("{e}"))?;

    let pool = db::init_pool(&config.database_url).await?;

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    let rpc = TonCenterClient::new(
        client,
        &config.toncenter_url,
        config.toncenter_api_key.clone(),
    );

    let shutdown = CancellationToken::new();

    // ─── Background poller ────────────────────────────────
    let poller_state = Arc::new(PollerState {
        pool: pool.clone(),
        config: config.clone(),
        rpc,
    });
    let poller = tokio::spawn(poller::run(poller_state, shutdown.clone()));

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState { pool });

    let app = Router::new()
        .route("/health", get(api::health))
        .route("/jobs", get(api::get_all_jobs))
        .route("/jobs/:address", get(api::get_job))
        .route("/domains", get(api::get_all_domains))
        .route("/quote", get(api::get_quote))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(api_state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    poller.await?;
    Ok(())
}
