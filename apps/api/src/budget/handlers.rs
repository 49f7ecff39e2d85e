//! Axum route handlers for the Budget API.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::budget::generator::{generate_budget_from_script, GenerateBudgetResponse};
use crate::budget::ledger::{
    delete_expense, find_expense, insert_expense, list_expenses, parse_amount, update_expense,
    BudgetSummary, ExpenseDraft,
};
use crate::budget::predictor::{PredictError, ProjectFeatures};
use crate::errors::AppError;
use crate::extract::{nullable, AppJson, AppPath};
use crate::models::expense::ExpenseRow;
use crate::models::project::ProjectRow;
use crate::projects::store::{require_project, require_project_exists, update_forecast};
use crate::schedule::store::parse_date;
use crate::script::analyzer::ScriptAnalysis;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: Value,
    pub category: Option<String>,
    /// `YYYY-MM-DD`; today when absent or blank.
    pub date: Option<String>,
}

/// Absent fields keep their stored value; `category: null` clears it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateExpenseRequest {
    /// When given, the expense must belong to this project.
    pub project_id: Option<Uuid>,
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Value,
    #[serde(default, deserialize_with = "nullable")]
    pub category: Option<Option<String>>,
    pub date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateExpenseResponse {
    pub message: String,
    pub expense: ExpenseRow,
}

#[derive(Debug, Deserialize)]
pub struct DeleteExpenseRequest {
    pub id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct DeleteExpenseResponse {
    pub message: String,
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predicted_budget: f64,
    /// True when prediction failed and `predicted_budget` is the zero default.
    pub fallback: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateForecastRequest {
    #[serde(default)]
    pub forecasted_budget: Value,
}

#[derive(Debug, Serialize)]
pub struct UpdateForecastResponse {
    pub message: String,
    pub forecasted_budget: f64,
}

#[derive(Debug, Deserialize)]
pub struct GenerateFromScriptRequest {
    pub project_id: Option<Uuid>,
}

fn optional_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match raw.map(str::trim) {
        Some("") | None => Ok(None),
        Some(value) => parse_date(field, value).map(Some),
    }
}

impl CreateExpenseRequest {
    pub fn into_draft(self) -> Result<ExpenseDraft, AppError> {
        let amount = parse_amount(&self.amount)?;
        Ok(ExpenseDraft::new(&self.description, amount)?
            .with_category(self.category.as_deref())?
            .with_date(optional_date("date", self.date.as_deref())?))
    }
}

impl UpdateExpenseRequest {
    /// Merges the patch over the stored expense and re-validates the result.
    pub fn merge(&self, existing: &ExpenseRow) -> Result<ExpenseDraft, AppError> {
        let amount = match &self.amount {
            Value::Null => existing.amount,
            raw => parse_amount(raw)?,
        };
        let category = match &self.category {
            Some(value) => value.as_deref(),
            None => existing.category.as_deref(),
        };
        let date = optional_date("date", self.date.as_deref())?.unwrap_or(existing.date);

        Ok(ExpenseDraft::new(
            self.description.as_deref().unwrap_or(&existing.description),
            amount,
        )?
        .with_category(category)?
        .with_date(Some(date)))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Expenses
// ────────────────────────────────────────────────────────────────────────────

/// GET /api/budget/expenses/:project_id
pub async fn handle_list_expenses(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
) -> Result<Json<Vec<ExpenseRow>>, AppError> {
    require_project_exists(&state.db, project_id).await?;
    Ok(Json(list_expenses(&state.db, project_id).await?))
}

/// POST /api/budget/expenses/:project_id
pub async fn handle_create_expense(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
    AppJson(request): AppJson<CreateExpenseRequest>,
) -> Result<(StatusCode, Json<ExpenseRow>), AppError> {
    let draft = request.into_draft()?;

    require_project_exists(&state.db, project_id).await?;
    let expense = insert_expense(&state.db, project_id, &draft).await?;

    Ok((StatusCode::CREATED, Json(expense)))
}

/// PUT /api/expense/:expense_id
pub async fn handle_update_expense(
    State(state): State<AppState>,
    AppPath(expense_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateExpenseRequest>,
) -> Result<Json<UpdateExpenseResponse>, AppError> {
    let not_found = || AppError::NotFound(format!("Expense {expense_id} not found"));

    let existing = find_expense(&state.db, expense_id)
        .await?
        .filter(|e| request.project_id.map_or(true, |p| p == e.project_id))
        .ok_or_else(not_found)?;
    let draft = request.merge(&existing)?;
    let expense = update_expense(&state.db, existing.project_id, expense_id, &draft)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(UpdateExpenseResponse {
        message: "Expense updated successfully.".to_string(),
        expense,
    }))
}

/// DELETE /api/budget/expenses/:project_id
pub async fn handle_delete_expense(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
    AppJson(request): AppJson<DeleteExpenseRequest>,
) -> Result<Json<DeleteExpenseResponse>, AppError> {
    let expense_id = request
        .id
        .ok_or_else(|| AppError::Validation("Expense id is required.".to_string()))?;

    if !delete_expense(&state.db, project_id, expense_id).await? {
        return Err(AppError::NotFound(format!(
            "Expense {expense_id} not found in project {project_id}"
        )));
    }

    Ok(Json(DeleteExpenseResponse {
        message: "Expense deleted.".to_string(),
        id: expense_id,
    }))
}

/// GET /api/budget/summary/:project_id
pub async fn handle_budget_summary(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
) -> Result<Json<BudgetSummary>, AppError> {
    let project = require_project(&state.db, project_id).await?;
    let expenses = list_expenses(&state.db, project_id).await?;
    Ok(Json(BudgetSummary::from_rows(project.forecasted_budget, &expenses)))
}

/// POST /api/project/:project_id/update_budget
pub async fn handle_update_forecast(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateForecastRequest>,
) -> Result<Json<UpdateForecastResponse>, AppError> {
    let forecasted = parse_amount(&request.forecasted_budget)
        .map_err(|_| AppError::Validation("Invalid budget value provided.".to_string()))?;

    if !update_forecast(&state.db, project_id, forecasted).await? {
        return Err(AppError::NotFound(format!("Project {project_id} not found")));
    }

    Ok(Json(UpdateForecastResponse {
        message: "Project budget updated successfully.".to_string(),
        forecasted_budget: forecasted,
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Prediction & generation
// ────────────────────────────────────────────────────────────────────────────

/// Feature extraction from the stored analysis, falling back to the project's
/// genre column when the analysis carries none.
pub fn project_features(project: &ProjectRow) -> Result<ProjectFeatures, PredictError> {
    let raw = project
        .analysis
        .clone()
        .ok_or(PredictError::MissingAnalysis)?;
    let analysis: ScriptAnalysis =
        serde_json::from_value(raw).map_err(|e| PredictError::InvalidAnalysis(e.to_string()))?;

    let mut features = ProjectFeatures::from_analysis(&analysis);
    if features.genre.is_none() {
        features.genre = project.genre.clone();
    }
    Ok(features)
}

/// POST /api/budget/predict/:project_id
///
/// Soft-fail: any prediction problem answers `predicted_budget: 0` with
/// `fallback: true` so the dashboard stays usable. Unknown projects are 404.
pub async fn handle_predict(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
) -> Result<Json<PredictResponse>, AppError> {
    let project = require_project(&state.db, project_id).await?;

    let prediction =
        project_features(&project).and_then(|features| state.predictor.predict(&features));

    let response = match prediction {
        Ok(predicted_budget) => {
            info!("Predicted budget {predicted_budget:.0} for project {project_id}");
            PredictResponse {
                predicted_budget,
                fallback: false,
            }
        }
        Err(e) => {
            warn!("Budget prediction failed for project {project_id}: {e}");
            PredictResponse {
                predicted_budget: 0.0,
                fallback: true,
            }
        }
    };

    Ok(Json(response))
}

/// POST /api/budget/generate_from_script
pub async fn handle_generate_from_script(
    State(state): State<AppState>,
    AppJson(request): AppJson<GenerateFromScriptRequest>,
) -> Result<Json<GenerateBudgetResponse>, AppError> {
    let project_id = request
        .project_id
        .ok_or_else(|| AppError::Validation("project_id is required.".to_string()))?;

    let response = generate_budget_from_script(&state.db, state.llm.as_ref(), project_id).await?;
    Ok(Json(response))
}
