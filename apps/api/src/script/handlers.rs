//! Axum route handlers for script analysis.

use axum::{extract::State, Json};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract::AppJson;
use crate::projects::store::require_project_exists;
use crate::script::analyzer::{analyze_script, validate_script, ScriptAnalysis};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub project_id: Option<Uuid>,
    #[serde(default)]
    pub script: String,
}

/// POST /api/script/analyze
///
/// Returns the breakdown without saving it; saving happens through
/// `POST /projects/new`. A `project_id`, when given, must exist.
pub async fn handle_analyze(
    State(state): State<AppState>,
    AppJson(request): AppJson<AnalyzeRequest>,
) -> Result<Json<ScriptAnalysis>, AppError> {
    // Validate before any store or LLM round-trip.
    validate_script(&request.script)?;

    if let Some(project_id) = request.project_id {
        require_project_exists(&state.db, project_id).await?;
    }

    info!(
        "Analyzing script ({} bytes) for project {:?}",
        request.script.len(),
        request.project_id
    );
    let analysis = analyze_script(&request.script, state.llm.as_ref()).await?;

    Ok(Json(analysis))
}
