use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A scene tracked through post-production.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SceneRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub scene_number: i32,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
