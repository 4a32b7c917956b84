use std::sync::Arc;

use basex_core::{GatewayConfig, GatewayObjectStore, ObjectStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub object_store: Arc<dyn ObjectStore>,
}

impl AppState {
    /// State backed by the object-store gateway named in `config`.
    pub fn new(config: GatewayConfig) -> Self {
        let object_store = GatewayObjectStore::new(config.object_store.clone());
        Self {
            config: Arc::new(config),
            object_store: Arc::new(object_store),
        }
    }

    /// Builder: fetch remote documents through `store` instead.
    pub fn with_object_store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.object_store = store;
        self
    }
}
