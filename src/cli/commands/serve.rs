use anyhow::Context;
use tracing::info;

use crate::app::{build_router, AppState};
use crate::config;
use crate::database::DatabaseManager;

pub async fn handle(port: Option<u16>) -> anyhow::Result<()> {
    let config = config::config();
    info!("Starting schoolhub API in {:?} mode", config.environment);
    if !crate::is_production!() {
        if let Ok(rendered) = serde_json::to_string(config) {
            tracing::debug!("effective configuration: {}", rendered);
        }
    }

    let pool = DatabaseManager::connect(&config.database)
        .await
        .context("failed to create database pool")?;
    let state = AppState::from_config(pool, config).context("invalid security configuration")?;
    if state.hq_api_key.is_none() {
        info!("HQ_API_KEY not set; /api/hq endpoints will refuse every request");
    }

    let app = build_router(state, &config.api.cors_origins);

    let port = port.unwrap_or(config.api.port);
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    info!("schoolhub API listening on http://{}", bind_addr);
    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
