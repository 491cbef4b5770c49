use crate::core::config::AppConfig;
use crate::tickets::classifier::FallbackClassifier;
use crate::tickets::storage::TicketStore;
use std::sync::Arc;

/// Shared, read-only state handed to every request handler.
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<dyn TicketStore>,
    pub classifier: FallbackClassifier,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn TicketStore>,
        classifier: FallbackClassifier,
    ) -> Self {
        Self {
            config,
            store,
            classifier,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("store", &self.store.backend())
            .field("classifier", &self.classifier)
            .finish()
    }
}
