use std::sync::Arc;

use sqlx::PgPool;

use crate::budget::predictor::BudgetPredictor;
use crate::config::Config;
use crate::llm_client::LlmBackend;
use crate::storage::ScriptArchive;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Anthropic client in production, a scripted backend in tests.
    pub llm: Arc<dyn LlmBackend>,
    /// Loaded once at startup. Falls back to an always-unavailable predictor
    /// when the model file is missing or invalid.
    pub predictor: Arc<dyn BudgetPredictor>,
    pub archive: ScriptArchive,
    #[allow(dead_code)]
    pub config: Config,
}
