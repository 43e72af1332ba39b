//! Transfer Ledger service
//!
//! ```text
//! ┌──────────┐    ┌─────────────┐    ┌──────────────┐    ┌───────────┐
//! │  Config  │───▶│   Stores    │───▶│ Coordinator  │───▶│  Gateway  │
//! │  (YAML)  │    │ (PG / mem)  │    │ (+converter) │    │  (axum)   │
//! └──────────┘    └─────────────┘    └──────────────┘    └───────────┘
//! ```
//!
//! Every component is constructed here and handed to its consumers; there
//! is no process-wide registry.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use transfer_ledger::account::AccountStore;
use transfer_ledger::config::{AppConfig, ConverterKind, StorageBackend};
use transfer_ledger::converter::{CurrencyConverter, FixedRateConverter, HttpRateConverter};
use transfer_ledger::db::Database;
use transfer_ledger::gateway::{self, AppState};
use transfer_ledger::store::{MemoryStore, PgStore};
use transfer_ledger::transfer::{TransferCoordinator, TransferLog, UnitOfWork};

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

struct Stores {
    accounts: Arc<dyn AccountStore>,
    transfers: Arc<dyn TransferLog>,
    uow: Arc<dyn UnitOfWork>,
    pg_db: Option<Arc<Database>>,
}

async fn build_stores(config: &AppConfig) -> anyhow::Result<Stores> {
    match config.database.backend {
        StorageBackend::Postgres => {
            let url = config
                .database
                .url
                .as_deref()
                .context("database.url (or DATABASE_URL) is required for the postgres backend")?;
            let db = Database::connect(
                url,
                config.database.max_connections,
                Duration::from_millis(config.database.acquire_timeout_ms),
            )
            .await
            .context("Failed to connect to PostgreSQL")?;
            if config.database.run_migrations {
                db.migrate().await.context("Failed to run migrations")?;
            }
            let store = Arc::new(PgStore::new(db.pool().clone()));
            Ok(Stores {
                accounts: store.clone(),
                transfers: store.clone(),
                uow: store,
                pg_db: Some(Arc::new(db)),
            })
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; balances are lost on exit");
            let store = Arc::new(MemoryStore::new());
            Ok(Stores {
                accounts: store.clone(),
                transfers: store.clone(),
                uow: store,
                pg_db: None,
            })
        }
    }
}

fn build_converter(config: &AppConfig) -> anyhow::Result<Arc<dyn CurrencyConverter>> {
    let converter = &config.converter;
    match converter.kind {
        ConverterKind::Http => {
            let api_key = std::env::var(&converter.api_key_env).with_context(|| {
                format!(
                    "Rate provider API key missing: set {}",
                    converter.api_key_env
                )
            })?;
            let http = HttpRateConverter::new(
                converter.base_url.clone(),
                api_key,
                Duration::from_millis(converter.timeout_ms),
            )
            .context("Failed to build rate provider client")?;
            tracing::info!(base_url = %converter.base_url, "Using HTTP rate provider");
            Ok(Arc::new(http))
        }
        ConverterKind::Fixed => {
            let fixed = FixedRateConverter::from_table(&converter.rates)
                .context("Invalid converter.rates table")?;
            tracing::info!(pairs = converter.rates.len(), "Using fixed rate table");
            Ok(Arc::new(fixed))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Some(port) = get_port_override() {
        app_config.gateway.port = port;
    }
    let _log_guard = transfer_ledger::logging::init_logging(&app_config);

    tracing::info!("Starting Transfer Ledger in {} mode", env);

    let stores = build_stores(&app_config).await?;
    let converter = build_converter(&app_config)?;

    let coordinator = Arc::new(TransferCoordinator::new(
        stores.accounts.clone(),
        stores.uow.clone(),
        converter,
    ));

    let state = Arc::new(AppState::new(
        stores.accounts,
        stores.transfers,
        coordinator,
        stores.pg_db,
        &app_config.gateway,
    ));

    gateway::run_server(&app_config.gateway, state).await
}
