use std::sync::Arc;

use mission_db::PgStore;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (the pool and store are reference-counted internally).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: mission_db::DbPool,
    /// Attendance store over the same pool.
    pub store: PgStore,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(pool: mission_db::DbPool, config: ServerConfig) -> Self {
        Self {
            store: PgStore::new(pool.clone()),
            pool,
            config: Arc::new(config),
        }
    }
}
