//! HTTP Gateway
//!
//! Thin presentation layer over the ledger: typed DTOs in, `{code, msg, data}`
//! envelope out, ledger error class mapped to the HTTP status.

pub mod handlers;
pub mod state;
pub mod types;

use anyhow::Context;
use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
pub use state::AppState;

/// Build the complete router
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/accounts",
            get(handlers::list_accounts).post(handlers::create_account),
        )
        .route(
            "/accounts/{id}",
            get(handlers::get_account)
                .patch(handlers::update_account)
                .delete(handlers::delete_account),
        )
        .route("/transfer", post(handlers::create_transfer))
        .route("/transactions", get(handlers::list_transfers))
        .route("/transactions/{id}", get(handlers::get_transfer))
        .with_state(state)
}

/// Start HTTP Gateway server; returns when ctrl-c is received.
pub async fn run_server(config: &GatewayConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {} (port already in use?)", addr))?;

    tracing::info!(
        addr = %addr,
        transfer_timeout_ms = config.transfer_timeout_ms,
        list_timeout_ms = config.list_timeout_ms,
        "Gateway listening"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
