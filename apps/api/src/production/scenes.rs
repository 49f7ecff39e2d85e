//! Post-production tracking: one row per scene, with progress derived on read.

use serde::Serialize;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::scene::SceneRow;

pub const DEFAULT_STATUS: &str = "To Do";
pub const DONE_STATUS: &str = "Done";
pub const MAX_STATUS_CHARS: usize = 50;
pub const MAX_DESCRIPTION_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq)]
pub struct SceneDraft {
    pub scene_number: i32,
    pub description: Option<String>,
    pub status: String,
}

impl SceneDraft {
    pub fn new(
        scene_number: i64,
        description: Option<&str>,
        status: Option<&str>,
    ) -> Result<Self, AppError> {
        let scene_number = i32::try_from(scene_number)
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| {
                AppError::Validation("Scene number must be a positive integer.".to_string())
            })?;

        let description = match description.map(str::trim) {
            Some("") | None => None,
            Some(text) if text.chars().count() > MAX_DESCRIPTION_CHARS => {
                return Err(AppError::Validation(format!(
                    "Scene description must be at most {MAX_DESCRIPTION_CHARS} characters."
                )))
            }
            Some(text) => Some(text.to_string()),
        };

        let status = match status {
            None => DEFAULT_STATUS.to_string(),
            Some(raw) => validate_status(raw)?,
        };

        Ok(Self {
            scene_number,
            description,
            status,
        })
    }
}

pub fn validate_status(raw: &str) -> Result<String, AppError> {
    let status = raw.trim();
    if status.is_empty() {
        return Err(AppError::Validation("Scene status is required.".to_string()));
    }
    if status.chars().count() > MAX_STATUS_CHARS {
        return Err(AppError::Validation(format!(
            "Scene status must be at most {MAX_STATUS_CHARS} characters."
        )));
    }
    Ok(status.to_string())
}

/// Scenes of a project with the share already marked done.
#[derive(Debug, Clone, Serialize)]
pub struct ScenesOverview {
    pub scenes: Vec<SceneRow>,
    pub total: usize,
    pub done: usize,
    /// `done / total * 100`, or 0 for a project without scenes.
    pub progress: f64,
}

impl ScenesOverview {
    pub fn new(scenes: Vec<SceneRow>) -> Self {
        let total = scenes.len();
        let done = scenes.iter().filter(|s| s.status == DONE_STATUS).count();
        let progress = progress_percent(done, total);
        Self {
            scenes,
            total,
            done,
            progress,
        }
    }
}

pub fn progress_percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        done as f64 / total as f64 * 100.0
    }
}

/// Scenes in script order.
pub async fn list_scenes(pool: &PgPool, project_id: Uuid) -> Result<Vec<SceneRow>, sqlx::Error> {
    sqlx::query_as::<_, SceneRow>(
        "SELECT * FROM scenes WHERE project_id = $1 ORDER BY scene_number, created_at",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
}

pub async fn insert_scene(
    pool: &PgPool,
    project_id: Uuid,
    draft: &SceneDraft,
) -> Result<SceneRow, sqlx::Error> {
    let row = sqlx::query_as::<_, SceneRow>(
        r#"
        INSERT INTO scenes (id, project_id, scene_number, description, status)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(draft.scene_number)
    .bind(&draft.description)
    .bind(&draft.status)
    .fetch_one(pool)
    .await?;

    info!("Added scene {} to project {project_id}", row.scene_number);
    Ok(row)
}

pub async fn find_scene(pool: &PgPool, scene_id: Uuid) -> Result<Option<SceneRow>, sqlx::Error> {
    sqlx::query_as::<_, SceneRow>("SELECT * FROM scenes WHERE id = $1")
        .bind(scene_id)
        .fetch_optional(pool)
        .await
}

pub async fn update_scene_status(
    pool: &PgPool,
    scene_id: Uuid,
    status: &str,
) -> Result<Option<SceneRow>, sqlx::Error> {
    sqlx::query_as::<_, SceneRow>("UPDATE scenes SET status = $2 WHERE id = $1 RETURNING *")
        .bind(scene_id)
        .bind(status)
        .fetch_optional(pool)
        .await
}

pub async fn delete_scene(pool: &PgPool, scene_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM scenes WHERE id = $1")
        .bind(scene_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
