//! Production assets: props, wardrobe, equipment and their acquisition state.

use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::budget::ledger::parse_amount;
use crate::errors::AppError;
use crate::models::asset::AssetRow;

pub const MAX_NAME_CHARS: usize = 100;
pub const MAX_STATUS_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq)]
pub struct AssetDraft {
    pub name: String,
    pub status: String,
    pub cost: f64,
}

impl AssetDraft {
    /// `cost` accepts the same forms as an expense amount.
    pub fn new(name: &str, status: &str, cost: &Value) -> Result<Self, AppError> {
        Ok(Self {
            name: required("Asset name", name, MAX_NAME_CHARS)?,
            status: required("Asset status", status, MAX_STATUS_CHARS)?,
            cost: parse_amount(cost)?,
        })
    }
}

fn required(field: &str, raw: &str, max: usize) -> Result<String, AppError> {
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

pub async fn list_assets(pool: &PgPool, project_id: Uuid) -> Result<Vec<AssetRow>, sqlx::Error> {
    sqlx::query_as::<_, AssetRow>("SELECT * FROM assets WHERE project_id = $1 ORDER BY seq")
        .bind(project_id)
        .fetch_all(pool)
        .await
}

pub async fn insert_asset(
    pool: &PgPool,
    project_id: Uuid,
    draft: &AssetDraft,
) -> Result<AssetRow, sqlx::Error> {
    let row = sqlx::query_as::<_, AssetRow>(
        r#"
        INSERT INTO assets (id, project_id, name, status, cost)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(&draft.name)
    .bind(&draft.status)
    .bind(draft.cost)
    .fetch_one(pool)
    .await?;

    info!("Added asset {} '{}' to project {project_id}", row.id, row.name);
    Ok(row)
}

pub async fn delete_asset(pool: &PgPool, asset_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM assets WHERE id = $1")
        .bind(asset_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_draft_normalizes() {
        let draft = AssetDraft::new(" Vintage typewriter ", " Sourced ", &json!("$350")).unwrap();
        assert_eq!(draft.name, "Vintage typewriter");
        assert_eq!(draft.status, "Sourced");
        assert_eq!(draft.cost, 350.0);
    }

    #[test]
    fn test_draft_rejects_bad_input() {
        assert!(AssetDraft::new("", "Sourced", &json!(10)).is_err());
        assert!(AssetDraft::new("Typewriter", " ", &json!(10)).is_err());
        assert!(AssetDraft::new("Typewriter", "Sourced", &json!(-1)).is_err());
        assert!(AssetDraft::new("Typewriter", "Sourced", &json!(null)).is_err());
        assert!(AssetDraft::new(&"n".repeat(MAX_NAME_CHARS + 1), "Sourced", &json!(1)).is_err());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_assets_round_trip_through_store(pool: PgPool) {
        let project_id = Uuid::new_v4();
        sqlx::query("INSERT INTO projects (id, name) VALUES ($1, 'Assets')")
            .bind(project_id)
            .execute(&pool)
            .await
            .unwrap();

        let typewriter = AssetDraft::new("Typewriter", "Sourced", &json!(350)).unwrap();
        let coat = AssetDraft::new("Trench coat", "Needed", &json!(120)).unwrap();
        let first = insert_asset(&pool, project_id, &typewriter).await.unwrap();
        insert_asset(&pool, project_id, &coat).await.unwrap();

        let names: Vec<_> = list_assets(&pool, project_id)
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.name)
            .collect();
        assert_eq!(names, ["Typewriter", "Trench coat"]);

        assert!(delete_asset(&pool, first.id).await.unwrap());
        assert!(!delete_asset(&pool, first.id).await.unwrap());
        assert_eq!(list_assets(&pool, project_id).await.unwrap().len(), 1);
    }
}
