use std::sync::Arc;

use portal_events::LifecycleNotifier;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: portal_db::DbPool,
    /// Server configuration, including the JWT settings.
    pub config: Arc<ServerConfig>,
    /// Receives lifecycle notifications after a state change has committed.
    pub notifier: Arc<dyn LifecycleNotifier>,
}
