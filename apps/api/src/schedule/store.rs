use chrono::NaiveDate;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::schedule::ScheduleItemRow;
use crate::script::analyzer::ScriptAnalysis;

pub const MAX_TASK_CHARS: usize = 500;
pub const MAX_ASSIGNEE_CHARS: usize = 100;
pub const MAX_STATUS_CHARS: usize = 50;
pub const MAX_LOCATION_CHARS: usize = 200;
pub const DEFAULT_STATUS: &str = "Pending";

const LOCATION_MANAGER: &str = "Location Manager";
const PROP_MASTER: &str = "Prop Master";

const INSERT_ITEM: &str = r#"
    INSERT INTO schedule_items
        (id, project_id, task_description, start_date, end_date, assigned_to, status, location)
    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
    RETURNING *
"#;

/// A validated schedule item, either new or the merged result of an update.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleDraft {
    pub task_description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub assigned_to: Option<String>,
    pub status: String,
    pub location: Option<String>,
}

impl ScheduleDraft {
    pub fn new(
        task_description: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        assigned_to: Option<&str>,
        status: Option<&str>,
    ) -> Result<Self, AppError> {
        let task_description = bounded("Task description", task_description, MAX_TASK_CHARS)?;
        if end_date < start_date {
            return Err(AppError::Validation(
                "End date cannot be before start date.".to_string(),
            ));
        }

        let assigned_to = match assigned_to.map(str::trim) {
            Some("") | None => None,
            Some(name) => Some(bounded("Assignee", name, MAX_ASSIGNEE_CHARS)?),
        };
        let status = match status.map(str::trim) {
            Some("") | None => DEFAULT_STATUS.to_string(),
            Some(s) => bounded("Status", s, MAX_STATUS_CHARS)?,
        };

        Ok(Self {
            task_description,
            start_date,
            end_date,
            assigned_to,
            status,
            location: None,
        })
    }

    /// Blank clears the location.
    pub fn with_location(mut self, location: Option<&str>) -> Result<Self, AppError> {
        self.location = match location.map(str::trim) {
            Some("") | None => None,
            Some(place) => Some(bounded("Location", place, MAX_LOCATION_CHARS)?),
        };
        Ok(self)
    }
}

/// Prep tasks for every character, location and prop of a breakdown, all
/// starting and ending on `day`. Entries that fail validation are skipped.
pub fn tasks_from_analysis(analysis: &ScriptAnalysis, day: NaiveDate) -> Vec<ScheduleDraft> {
    let characters = analysis.characters.iter().map(|c| {
        ScheduleDraft::new(
            &format!("Character: {} - Costume fitting, makeup test, and rehearsal.", c.name),
            day,
            day,
            Some(&c.name),
            None,
        )
    });
    let locations = analysis.locations.iter().map(|l| {
        ScheduleDraft::new(
            &format!("Location: {} - Scouting, permits, and set dressing.", l.name),
            day,
            day,
            Some(LOCATION_MANAGER),
            None,
        )
        .and_then(|draft| draft.with_location(Some(&l.name)))
    });
    let props = analysis.props.iter().map(|p| {
        ScheduleDraft::new(
            &format!("Prop: {p} - Sourcing, acquisition, or fabrication."),
            day,
            day,
            Some(PROP_MASTER),
            None,
        )
    });

    characters
        .chain(locations)
        .chain(props)
        .filter_map(|draft| match draft {
            Ok(draft) => Some(draft),
            Err(e) => {
                warn!("Skipping generated schedule task: {e}");
                None
            }
        })
        .collect()
}

fn bounded(field: &str, raw: &str, max: usize) -> Result<String, AppError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required.")));
    }
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{field} must be at most {max} characters."
        )));
    }
    Ok(value.to_string())
}

/// Strict `YYYY-MM-DD`.
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!("{field} must be a date in YYYY-MM-DD format."))
    })
}

/// Items of a project by start date; ties keep creation order.
pub async fn list_items(pool: &PgPool, project_id: Uuid) -> Result<Vec<ScheduleItemRow>, sqlx::Error> {
    sqlx::query_as::<_, ScheduleItemRow>(
        "SELECT * FROM schedule_items WHERE project_id = $1 ORDER BY start_date, created_at",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await
}

pub async fn find_item(pool: &PgPool, item_id: Uuid) -> Result<Option<ScheduleItemRow>, sqlx::Error> {
    sqlx::query_as::<_, ScheduleItemRow>("SELECT * FROM schedule_items WHERE id = $1")
        .bind(item_id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_item(
    pool: &PgPool,
    project_id: Uuid,
    draft: &ScheduleDraft,
) -> Result<ScheduleItemRow, sqlx::Error> {
    let row = bind_draft(sqlx::query_as::<_, ScheduleItemRow>(INSERT_ITEM), project_id, draft)
        .fetch_one(pool)
        .await?;

    info!("Added schedule item {} to project {project_id}", row.id);
    Ok(row)
}

/// Inserts every draft or none of them.
pub async fn insert_items(
    pool: &PgPool,
    project_id: Uuid,
    drafts: &[ScheduleDraft],
) -> Result<Vec<ScheduleItemRow>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    let mut rows = Vec::with_capacity(drafts.len());
    for draft in drafts {
        let row = bind_draft(sqlx::query_as::<_, ScheduleItemRow>(INSERT_ITEM), project_id, draft)
            .fetch_one(&mut *tx)
            .await?;
        rows.push(row);
    }
    tx.commit().await?;

    info!("Added {} schedule items to project {project_id}", rows.len());
    Ok(rows)
}

fn bind_draft<'q>(
    query: sqlx::query::QueryAs<'q, sqlx::Postgres, ScheduleItemRow, sqlx::postgres::PgArguments>,
    project_id: Uuid,
    draft: &'q ScheduleDraft,
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, ScheduleItemRow, sqlx::postgres::PgArguments> {
    query
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(&draft.task_description)
        .bind(draft.start_date)
        .bind(draft.end_date)
        .bind(&draft.assigned_to)
        .bind(&draft.status)
        .bind(&draft.location)
}

/// Overwrites every editable column. Returns None when the item is gone.
pub async fn update_item(
    pool: &PgPool,
    item_id: Uuid,
    draft: &ScheduleDraft,
) -> Result<Option<ScheduleItemRow>, sqlx::Error> {
    sqlx::query_as::<_, ScheduleItemRow>(
        r#"
        UPDATE schedule_items
        SET task_description = $2, start_date = $3, end_date = $4, assigned_to = $5, status = $6,
            location = $7
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(item_id)
    .bind(&draft.task_description)
    .bind(draft.start_date)
    .bind(draft.end_date)
    .bind(&draft.assigned_to)
    .bind(&draft.status)
    .bind(&draft.location)
    .fetch_optional(pool)
    .await
}

pub async fn delete_item(pool: &PgPool, item_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM schedule_items WHERE id = $1")
        .bind(item_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
