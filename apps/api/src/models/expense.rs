use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ExpenseRow {
    pub id: Uuid,
    pub project_id: Uuid,
    pub description: String,
    pub amount: f64,
    /// Insertion order; display order of the ledger.
    #[serde(skip_serializing)]
    pub seq: i64,
    pub created_at: DateTime<Utc>,
    pub category: Option<String>,
    /// Day the money was spent; defaults to the insert date.
    pub date: NaiveDate,
}
