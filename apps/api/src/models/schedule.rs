use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScheduleItemRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub task_description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub assigned_to: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub location: Option<String>,
}
