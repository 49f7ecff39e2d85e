use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::project::{ProjectRow, ProjectSummaryRow};

/// Fields of a project at creation time. The analysis is written once here and
/// never rewritten by later flows.
pub struct NewProject<'a> {
    pub id: Uuid,
    pub name: &'a str,
    pub script_text: &'a str,
    pub analysis: Option<&'a Value>,
    pub genre: Option<&'a str>,
    pub logline: Option<&'a str>,
    pub script_file_key: Option<&'a str>,
}

pub async fn insert_project(pool: &PgPool, project: NewProject<'_>) -> Result<ProjectRow, sqlx::Error> {
    let row = sqlx::query_as::<_, ProjectRow>(
        r#"
        INSERT INTO projects (id, name, script_text, analysis, genre, logline, script_file_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(project.id)
    .bind(project.name)
    .bind(project.script_text)
    .bind(project.analysis)
    .bind(project.genre)
    .bind(project.logline)
    .bind(project.script_file_key)
    .fetch_one(pool)
    .await?;

    info!("Created project {} ({})", row.id, row.name);
    Ok(row)
}

pub async fn find_project(pool: &PgPool, project_id: Uuid) -> Result<Option<ProjectRow>, sqlx::Error> {
    sqlx::query_as::<_, ProjectRow>("SELECT * FROM projects WHERE id = $1")
        .bind(project_id)
        .fetch_optional(pool)
        .await
}

/// Loads a project or fails with 404.
pub async fn require_project(pool: &PgPool, project_id: Uuid) -> Result<ProjectRow, AppError> {
    find_project(pool, project_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {project_id} not found")))
}

/// Existence check for flows that only need the foreign key to be valid.
pub async fn require_project_exists(pool: &PgPool, project_id: Uuid) -> Result<(), AppError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
        .bind(project_id)
        .fetch_one(pool)
        .await?;

    if exists {
        Ok(())
    } else {
        Err(AppError::NotFound(format!("Project {project_id} not found")))
    }
}

/// Newest first.
pub async fn list_projects(pool: &PgPool) -> Result<Vec<ProjectSummaryRow>, sqlx::Error> {
    sqlx::query_as::<_, ProjectSummaryRow>(
        r#"
        SELECT id, name, genre, logline, forecasted_budget, created_at
        FROM projects
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await
}

/// Returns false when no project matched.
pub async fn update_forecast(pool: &PgPool, project_id: Uuid, forecasted: f64) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("UPDATE projects SET forecasted_budget = $1 WHERE id = $2")
        .bind(forecasted)
        .bind(project_id)
        .execute(pool)
        .await?;

    if result.rows_affected() > 0 {
        info!("Project {project_id} forecast set to {forecasted}");
    }
    Ok(result.rows_affected() > 0)
}
