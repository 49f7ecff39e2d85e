use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract::{AppJson, AppPath};
use crate::models::project::{ProjectRow, ProjectSummaryRow};
use crate::projects::store::{insert_project, list_projects, require_project, NewProject};
use crate::script::analyzer::ScriptAnalysis;
use crate::state::AppState;

pub const MAX_PROJECT_NAME_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub script_text: String,
    /// Either the analysis object itself or its JSON-encoded string form.
    #[serde(default)]
    pub analysis_json: Value,
}

#[derive(Debug, Serialize)]
pub struct ScriptContentResponse {
    pub script_content: String,
}

/// Trims and bounds a project name.
pub fn validate_project_name(name: &str) -> Result<&str, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("Project name is required.".to_string()));
    }
    if name.chars().count() > MAX_PROJECT_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "Project name must be at most {MAX_PROJECT_NAME_CHARS} characters."
        )));
    }
    Ok(name)
}

/// Accepts `null`, an analysis object, or a string holding analysis JSON.
pub fn parse_analysis_payload(raw: &Value) -> Result<Option<ScriptAnalysis>, AppError> {
    let value = match raw {
        Value::Null => return Ok(None),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => serde_json::from_str::<Value>(s)
            .map_err(|e| AppError::Validation(format!("analysis_json is not valid JSON: {e}")))?,
        other => other.clone(),
    };

    serde_json::from_value::<ScriptAnalysis>(value)
        .map(|a| Some(a.normalize()))
        .map_err(|e| AppError::Validation(format!("analysis_json is not a script analysis: {e}")))
}

/// POST /projects/new
pub async fn handle_create_project(
    State(state): State<AppState>,
    AppJson(request): AppJson<CreateProjectRequest>,
) -> Result<(StatusCode, Json<ProjectRow>), AppError> {
    let name = validate_project_name(&request.name)?;
    let analysis = parse_analysis_payload(&request.analysis_json)?;
    let analysis_value = analysis
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(|e| AppError::Internal(e.into()))?;

    let project = insert_project(
        &state.db,
        NewProject {
            id: Uuid::new_v4(),
            name,
            script_text: &request.script_text,
            analysis: analysis_value.as_ref(),
            genre: analysis.as_ref().and_then(|a| a.genre.as_deref()),
            logline: analysis.as_ref().and_then(|a| a.logline.as_deref()),
            script_file_key: None,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /projects
pub async fn handle_list_projects(
    State(state): State<AppState>,
) -> Result<Json<Vec<ProjectSummaryRow>>, AppError> {
    Ok(Json(list_projects(&state.db).await?))
}

/// GET /projects/:project_id
pub async fn handle_get_project(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
) -> Result<Json<ProjectRow>, AppError> {
    Ok(Json(require_project(&state.db, project_id).await?))
}

/// GET /api/project/:project_id/script_content
pub async fn handle_script_content(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
) -> Result<Json<ScriptContentResponse>, AppError> {
    let project = require_project(&state.db, project_id).await?;
    if project.script_text.trim().is_empty() {
        return Err(AppError::NotFound(
            "No script associated with this project.".to_string(),
        ));
    }
    Ok(Json(ScriptContentResponse {
        script_content: project.script_text,
    }))
}
