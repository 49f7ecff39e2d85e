use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One row of the append-only copilot log.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessageRow {
    pub id: Uuid,
    pub project_id: Uuid,
    /// "user" | "assistant"
    pub role: String,
    pub text: String,
    pub seq: i64,
    pub created_at: DateTime<Utc>,
}
