//! Axum route handlers for the budget copilot.

use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::copilot::dialogue::{run_copilot_turn, BudgetSnapshot, CopilotResponse};
use crate::copilot::history::{load_history, HistoryEntry};
use crate::errors::AppError;
use crate::extract::{AppJson, AppPath};
use crate::projects::store::require_project_exists;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CopilotRequest {
    #[serde(default)]
    pub message: String,
    /// Budget as currently displayed; the stored ledger is used when omitted.
    pub budget: Option<BudgetSnapshot>,
}

/// GET /api/budget/copilot/history/:project_id
pub async fn handle_copilot_history(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
) -> Result<Json<Vec<HistoryEntry>>, AppError> {
    require_project_exists(&state.db, project_id).await?;
    Ok(Json(load_history(&state.db, project_id).await?))
}

/// POST /api/budget/copilot/:project_id
pub async fn handle_copilot_message(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
    AppJson(request): AppJson<CopilotRequest>,
) -> Result<Json<CopilotResponse>, AppError> {
    let response = run_copilot_turn(
        &state.db,
        state.llm.as_ref(),
        project_id,
        &request.message,
        request.budget,
    )
    .await?;
    Ok(Json(response))
}
