use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectRow {
    pub id: Uuid,
    pub name: String,
    pub script_text: String,
    pub analysis: Option<Value>,
    pub genre: Option<String>,
    pub logline: Option<String>,
    pub forecasted_budget: f64,
    pub script_file_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing view without the script body or analysis payload.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectSummaryRow {
    pub id: Uuid,
    pub name: String,
    pub genre: Option<String>,
    pub logline: Option<String>,
    pub forecasted_budget: f64,
    pub created_at: DateTime<Utc>,
}
