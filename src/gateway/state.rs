use std::sync::Arc;
use std::time::Duration;

use crate::account::AccountStore;
use crate::config::GatewayConfig;
use crate::context::RequestContext;
use crate::db::Database;
use crate::transfer::{TransferCoordinator, TransferLog};

/// Gateway application state (shared)
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub transfers: Arc<dyn TransferLog>,
    pub coordinator: Arc<TransferCoordinator>,
    /// PostgreSQL pool, `None` on the memory backend
    pub pg_db: Option<Arc<Database>>,
    pub transfer_timeout: Duration,
    pub list_timeout: Duration,
}

impl AppState {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        transfers: Arc<dyn TransferLog>,
        coordinator: Arc<TransferCoordinator>,
        pg_db: Option<Arc<Database>>,
        gateway: &GatewayConfig,
    ) -> Self {
        Self {
            accounts,
            transfers,
            coordinator,
            pg_db,
            transfer_timeout: gateway.transfer_timeout(),
            list_timeout: gateway.list_timeout(),
        }
    }

    pub fn transfer_ctx(&self) -> RequestContext {
        RequestContext::with_timeout(self.transfer_timeout)
    }

    pub fn list_ctx(&self) -> RequestContext {
        RequestContext::with_timeout(self.list_timeout)
    }
}
