use std::sync::Arc;

use crate::api::{ApiError, JournalBackend, SupabaseBackend};
use crate::config::{BackendKind, Config};
use crate::db::LocalBackend;

/// Shared by every request handler.
pub struct AppState {
    pub config: Config,
    pub backend: Arc<dyn JournalBackend>,
}

impl AppState {
    pub fn new(config: Config, backend: Arc<dyn JournalBackend>) -> Self {
        Self { config, backend }
    }

    /// Builds the backend named by the configuration.
    pub fn from_config(config: Config) -> Result<Self, ApiError> {
        let backend: Arc<dyn JournalBackend> = match config.backend {
            BackendKind::Supabase => Arc::new(SupabaseBackend::new(&config.supabase_url, &config.supabase_anon_key)),
            BackendKind::Local => Arc::new(LocalBackend::open(&config.db_path)?),
        };
        log::info!("Using {} backend", backend.backend_name());
        Ok(Self::new(config, backend))
    }
}
