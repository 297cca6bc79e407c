use std::sync::Arc;

use minebud_db::DbPool;
use minebud_lifecycle::OperationService;

use crate::config::ServerConfig;

/// Handler state. Every field is a cheap handle.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub config: Arc<ServerConfig>,
    /// All operation transitions go through this service.
    pub operations: OperationService,
}
