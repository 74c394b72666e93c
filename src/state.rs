use crate::db::DbPool;
use crate::registry::SharedRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Role-partitioned registry of live WebSocket connections, constructed
    /// once at startup and injected here (never a module-level singleton)
    pub registry: SharedRegistry,
    /// Fallback locale for greetings and guest records
    pub default_language: String,
    /// Data directory (DB, keys, uploaded message files)
    pub data_dir: String,
}
