use anyhow::Context;
use dotenvy::dotenv;
use log::{info, warn};
use std::sync::Arc;

use ticketserver::core::config::{AppConfig, StoreBackend};
use ticketserver::core::shared::state::AppState;
use ticketserver::core::shared::utils::{create_conn, run_migrations};
use ticketserver::llm::GeminiClient;
use ticketserver::main_module::run_axum_server;
use ticketserver::tickets::classifier::{FallbackClassifier, LlmClassifier};
use ticketserver::tickets::storage::{MemoryTicketStore, PgTicketStore, TicketStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env().context("Failed to load config from env")?;

    let store: Arc<dyn TicketStore> = match config.store {
        StoreBackend::Postgres => {
            let pool = create_conn(&config.database).context("Database pool creation failed")?;
            run_migrations(&pool).context("Failed to run database migrations")?;
            Arc::new(PgTicketStore::new(pool))
        }
        StoreBackend::Memory => {
            warn!("Using in-memory ticket store; tickets are lost on restart");
            Arc::new(MemoryTicketStore::new())
        }
    };

    let classifier = match GeminiClient::from_config(&config.gemini) {
        Some(client) => {
            info!("Classifier using Gemini model {}", config.gemini.model);
            FallbackClassifier::new(Arc::new(LlmClassifier::new(Arc::new(client))))
        }
        None => {
            warn!("GEMINI_API_KEY not set, classifying tickets with keyword rules only");
            FallbackClassifier::rules_only()
        }
    };

    info!("Ticket store backend: {}", store.backend());
    let app_state = Arc::new(AppState::new(config, store, classifier));
    run_axum_server(app_state).await?;
    Ok(())
}
