//! Axum route handlers for the production schedule.

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::extract::{nullable, AppJson, AppPath};
use crate::models::schedule::ScheduleItemRow;
use crate::projects::store::{require_project, require_project_exists};
use crate::schedule::store::{
    delete_item, find_item, insert_item, insert_items, list_items, parse_date, tasks_from_analysis,
    update_item, ScheduleDraft,
};
use crate::script::analyzer::ScriptAnalysis;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateScheduleItemRequest {
    #[serde(default)]
    pub task_description: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
    pub assigned_to: Option<String>,
    pub status: Option<String>,
    pub location: Option<String>,
}

/// Absent fields keep their stored value. `null` clears the assignee or location.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateScheduleItemRequest {
    pub task_description: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub assigned_to: Option<Option<String>>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub location: Option<Option<String>>,
}

#[derive(Debug, Serialize)]
pub struct ScheduleMessageResponse {
    pub message: String,
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct GeneratedTasksResponse {
    pub message: String,
    /// Descriptions of the created tasks, in creation order.
    pub tasks: Vec<String>,
}

impl CreateScheduleItemRequest {
    pub fn into_draft(self) -> Result<ScheduleDraft, AppError> {
        ScheduleDraft::new(
            &self.task_description,
            parse_date("start_date", &self.start_date)?,
            parse_date("end_date", &self.end_date)?,
            self.assigned_to.as_deref(),
            self.status.as_deref(),
        )?
        .with_location(self.location.as_deref())
    }
}

impl UpdateScheduleItemRequest {
    /// Merges the patch over the stored item and re-validates the result.
    /// Empty date strings count as absent.
    pub fn merge(&self, existing: &ScheduleItemRow) -> Result<ScheduleDraft, AppError> {
        let date_or = |field: &str, raw: &Option<String>, current| match raw.as_deref().map(str::trim) {
            Some("") | None => Ok(current),
            Some(value) => parse_date(field, value),
        };

        let assigned_to = match &self.assigned_to {
            Some(value) => value.as_deref(),
            None => existing.assigned_to.as_deref(),
        };
        let location = match &self.location {
            Some(value) => value.as_deref(),
            None => existing.location.as_deref(),
        };

        ScheduleDraft::new(
            self.task_description
                .as_deref()
                .unwrap_or(&existing.task_description),
            date_or("start_date", &self.start_date, existing.start_date)?,
            date_or("end_date", &self.end_date, existing.end_date)?,
            assigned_to,
            Some(self.status.as_deref().unwrap_or(&existing.status)),
        )?
        .with_location(location)
    }
}

/// GET /api/schedule/:project_id
pub async fn handle_list_schedule(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
) -> Result<Json<Vec<ScheduleItemRow>>, AppError> {
    require_project_exists(&state.db, project_id).await?;
    Ok(Json(list_items(&state.db, project_id).await?))
}

/// POST /api/schedule/:project_id
pub async fn handle_create_schedule_item(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
    AppJson(request): AppJson<CreateScheduleItemRequest>,
) -> Result<(StatusCode, Json<ScheduleItemRow>), AppError> {
    let draft = request.into_draft()?;
    require_project_exists(&state.db, project_id).await?;
    let item = insert_item(&state.db, project_id, &draft).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /api/schedule/:project_id/generate_tasks_from_script
///
/// One prep task per character, location and prop of the stored analysis,
/// all dated today.
pub async fn handle_generate_tasks(
    State(state): State<AppState>,
    AppPath(project_id): AppPath<Uuid>,
) -> Result<(StatusCode, Json<GeneratedTasksResponse>), AppError> {
    let project = require_project(&state.db, project_id).await?;
    let no_analysis = || AppError::Validation("No script analysis found for this project.".to_string());
    let raw = project.analysis.ok_or_else(no_analysis)?;
    let analysis: ScriptAnalysis = serde_json::from_value(raw).map_err(|e| {
        AppError::Validation(format!("Stored script analysis is unreadable: {e}"))
    })?;

    let today = chrono::Utc::now().date_naive();
    let drafts = tasks_from_analysis(&analysis, today);
    let rows = insert_items(&state.db, project_id, &drafts).await?;
    info!("Generated {} schedule tasks for project {project_id}", rows.len());

    Ok((
        StatusCode::CREATED,
        Json(GeneratedTasksResponse {
            message: format!(
                "{} tasks generated successfully from script analysis.",
                rows.len()
            ),
            tasks: rows.into_iter().map(|row| row.task_description).collect(),
        }),
    ))
}

/// PUT /api/schedule/item/:item_id
pub async fn handle_update_schedule_item(
    State(state): State<AppState>,
    AppPath(item_id): AppPath<Uuid>,
    AppJson(request): AppJson<UpdateScheduleItemRequest>,
) -> Result<Json<ScheduleItemRow>, AppError> {
    let not_found = || AppError::NotFound(format!("Schedule item {item_id} not found"));

    let existing = find_item(&state.db, item_id).await?.ok_or_else(not_found)?;
    let draft = request.merge(&existing)?;
    let updated = update_item(&state.db, item_id, &draft)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(updated))
}

/// DELETE /api/schedule/item/:item_id
pub async fn handle_delete_schedule_item(
    State(state): State<AppState>,
    AppPath(item_id): AppPath<Uuid>,
) -> Result<Json<ScheduleMessageResponse>, AppError> {
    if !delete_item(&state.db, item_id).await? {
        return Err(AppError::NotFound(format!("Schedule item {item_id} not found")));
    }
    Ok(Json(ScheduleMessageResponse {
        message: "Schedule item deleted.".to_string(),
        id: item_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use serde_json::json;

    fn existing() -> ScheduleItemRow {
        ScheduleItemRow {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            task_description: "Shoot OFFICE".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 3, 3).unwrap(),
            assigned_to: Some("JOHN".into()),
            status: "Pending".into(),
            created_at: Utc::now(),
            location: Some("OFFICE".into()),
        }
    }

    fn patch(body: serde_json::Value) -> UpdateScheduleItemRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_create_request_into_draft() {
        let request: CreateScheduleItemRequest = serde_json::from_value(json!({
            "task_description": "Location scout",
            "start_date": "2025-02-10",
            "end_date": "2025-02-12"
        }))
        .unwrap();
        let draft = request.into_draft().unwrap();
        assert_eq!(draft.status, "Pending");
        assert_eq!(draft.end_date, NaiveDate::from_ymd_opt(2025, 2, 12).unwrap());
    }

    #[test]
    fn test_create_request_requires_dates() {
        let request: CreateScheduleItemRequest =
            serde_json::from_value(json!({"task_description": "Scout"})).unwrap();
        assert!(matches!(request.into_draft(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_empty_patch_keeps_everything() {
        let item = existing();
        let draft = patch(json!({})).merge(&item).unwrap();
        assert_eq!(draft.task_description, item.task_description);
        assert_eq!(draft.start_date, item.start_date);
        assert_eq!(draft.assigned_to.as_deref(), Some("JOHN"));
        assert_eq!(draft.status, "Pending");
    }

    #[test]
    fn test_patch_updates_given_fields_only() {
        let draft = patch(json!({"status": "Done", "end_date": "2025-03-04", "start_date": ""}))
            .merge(&existing())
            .unwrap();
        assert_eq!(draft.status, "Done");
        assert_eq!(draft.start_date, NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
        assert_eq!(draft.end_date, NaiveDate::from_ymd_opt(2025, 3, 4).unwrap());
    }

    #[test]
    fn test_null_assignee_clears() {
        let request = patch(json!({"assigned_to": null}));
        assert_eq!(request.assigned_to, Some(None));
        assert_eq!(request.merge(&existing()).unwrap().assigned_to, None);
    }

    #[test]
    fn test_location_patch() {
        assert_eq!(
            patch(json!({})).merge(&existing()).unwrap().location.as_deref(),
            Some("OFFICE")
        );
        assert_eq!(
            patch(json!({"location": "ROOFTOP"})).merge(&existing()).unwrap().location.as_deref(),
            Some("ROOFTOP")
        );
        assert_eq!(patch(json!({"location": null})).merge(&existing()).unwrap().location, None);
    }

    #[test]
    fn test_create_request_keeps_location() {
        let request: CreateScheduleItemRequest = serde_json::from_value(json!({
            "task_description": "Night shoot",
            "start_date": "2025-02-10",
            "end_date": "2025-02-10",
            "location": "PIER"
        }))
        .unwrap();
        assert_eq!(request.into_draft().unwrap().location.as_deref(), Some("PIER"));
    }

    #[test]
    fn test_patch_cannot_invert_dates() {
        let err = patch(json!({"start_date": "2025-03-10"}))
            .merge(&existing())
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
