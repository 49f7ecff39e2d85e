//! Copilot actions: the structured side effect a copilot reply may carry.
//!
//! The LLM emits a loose JSON object; it is parsed into `CopilotAction` once, and
//! only that typed form is ever applied. Unrecognised kinds become
//! `CopilotAction::Unknown` and are reported back, never applied.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::budget::ledger::{
    delete_latest_matching, insert_expense, parse_amount, ExpenseDraft,
};
use crate::errors::AppError;
use crate::projects::store::update_forecast;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CopilotAction {
    AddItem { description: String, amount: f64 },
    RemoveItem { description: String },
    UpdateForecast { amount: f64 },
    Unknown { kind: String },
}

impl CopilotAction {
    pub fn kind(&self) -> &str {
        match self {
            CopilotAction::AddItem { .. } => "add_item",
            CopilotAction::RemoveItem { .. } => "remove_item",
            CopilotAction::UpdateForecast { .. } => "update_forecast",
            CopilotAction::Unknown { kind } => kind,
        }
    }

    /// Parses the `action` field of a copilot reply.
    ///
    /// `Ok(None)` for null/absent and for an object that names no kind. `Err`
    /// for a recognised kind whose payload is invalid (e.g. a negative amount).
    pub fn parse(raw: &Value) -> Result<Option<CopilotAction>, RejectedAction> {
        let obj = match raw {
            Value::Null => return Ok(None),
            Value::Object(obj) => obj,
            Value::String(kind) => {
                return Ok(Some(CopilotAction::Unknown {
                    kind: kind.trim().to_string(),
                }))
            }
            other => {
                return Ok(Some(CopilotAction::Unknown {
                    kind: other.to_string(),
                }))
            }
        };

        let Some(kind) = ["type", "action", "kind"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(|k| k.trim().to_ascii_lowercase())
            .filter(|k| !k.is_empty())
        else {
            return Ok(None);
        };

        let text = |keys: &[&str]| -> String {
            keys.iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string()
        };
        let reject = |reason: String| RejectedAction {
            kind: kind.clone(),
            reason,
        };

        let action = match kind.as_str() {
            "add_item" => {
                let amount = parse_amount(obj.get("amount").unwrap_or(&Value::Null))
                    .map_err(|e| reject(e.to_string()))?;
                let draft = ExpenseDraft::new(&text(&["description", "item", "name"]), amount)
                    .map_err(|e| reject(e.to_string()))?;
                CopilotAction::AddItem {
                    description: draft.description,
                    amount: draft.amount,
                }
            }
            "remove_item" => {
                let description = text(&["description", "item", "name"]).trim().to_string();
                if description.is_empty() {
                    return Err(reject("remove_item needs a description".to_string()));
                }
                CopilotAction::RemoveItem { description }
            }
            "update_forecast" => {
                let raw_amount = obj
                    .get("amount")
                    .or_else(|| obj.get("forecasted_budget"))
                    .unwrap_or(&Value::Null);
                let amount = parse_amount(raw_amount).map_err(|e| reject(e.to_string()))?;
                CopilotAction::UpdateForecast { amount }
            }
            _ => CopilotAction::Unknown { kind: kind.clone() },
        };

        Ok(Some(action))
    }
}

/// A recognised action whose payload failed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedAction {
    pub kind: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Side effect already persisted.
    Applied,
    /// Recognised but not applied (invalid payload or nothing to act on).
    Rejected,
    /// Kind not recognised by this server.
    Unsupported,
}

/// What happened to the action, as returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct ActionReport {
    #[serde(rename = "type")]
    pub kind: String,
    pub status: ActionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expense_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ActionReport {
    fn new(kind: &str, status: ActionStatus) -> Self {
        Self {
            kind: kind.to_string(),
            status,
            description: None,
            amount: None,
            expense_id: None,
            detail: None,
        }
    }

    pub fn rejected(rejected: RejectedAction) -> Self {
        Self {
            detail: Some(rejected.reason),
            ..Self::new(&rejected.kind, ActionStatus::Rejected)
        }
    }
}

/// Applies an action to the store. Store failures propagate; everything else
/// is reported in the returned `ActionReport`.
pub async fn apply_action(
    pool: &PgPool,
    project_id: Uuid,
    action: &CopilotAction,
) -> Result<ActionReport, AppError> {
    let report = match action {
        CopilotAction::AddItem {
            description,
            amount,
        } => {
            let draft = ExpenseDraft {
                description: description.clone(),
                amount: *amount,
                category: None,
                date: None,
            };
            let expense = insert_expense(pool, project_id, &draft).await?;
            ActionReport {
                description: Some(expense.description),
                amount: Some(expense.amount),
                expense_id: Some(expense.id),
                ..ActionReport::new(action.kind(), ActionStatus::Applied)
            }
        }
        CopilotAction::RemoveItem { description } => {
            match delete_latest_matching(pool, project_id, description).await? {
                Some(removed) => {
                    info!("Copilot removed expense {} from project {project_id}", removed.id);
                    ActionReport {
                        description: Some(removed.description),
                        amount: Some(removed.amount),
                        expense_id: Some(removed.id),
                        ..ActionReport::new(action.kind(), ActionStatus::Applied)
                    }
                }
                None => ActionReport {
                    description: Some(description.clone()),
                    detail: Some(format!("No expense named '{description}'")),
                    ..ActionReport::new(action.kind(), ActionStatus::Rejected)
                },
            }
        }
        CopilotAction::UpdateForecast { amount } => {
            if !update_forecast(pool, project_id, *amount).await? {
                return Err(AppError::NotFound(format!("Project {project_id} not found")));
            }
            ActionReport {
                amount: Some(*amount),
                ..ActionReport::new(action.kind(), ActionStatus::Applied)
            }
        }
        CopilotAction::Unknown { kind } => {
            warn!("Copilot proposed unsupported action '{kind}' for project {project_id}");
            ActionReport {
                detail: Some("This action is not supported.".to_string()),
                ..ActionReport::new(kind, ActionStatus::Unsupported)
            }
        }
    };

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_action_is_none() {
        assert_eq!(CopilotAction::parse(&Value::Null), Ok(None));
    }

    #[test]
    fn test_add_item_parses_and_normalizes() {
        let action = CopilotAction::parse(&json!({
            "type": "add_item",
            "description": "  Catering ",
            "amount": "$2,500"
        }))
        .unwrap()
        .unwrap();
        assert_eq!(
            action,
            CopilotAction::AddItem {
                description: "Catering".into(),
                amount: 2500.0
            }
        );
        assert_eq!(action.kind(), "add_item");
    }

    #[test]
    fn test_add_item_accepts_alternate_keys() {
        let action = CopilotAction::parse(&json!({"action": "ADD_ITEM", "item": "Fog machine", "amount": 300}))
            .unwrap()
            .unwrap();
        assert!(matches!(action, CopilotAction::AddItem { ref description, .. } if description == "Fog machine"));
    }

    #[test]
    fn test_add_item_with_negative_amount_is_rejected() {
        let err = CopilotAction::parse(&json!({"type": "add_item", "description": "Refund", "amount": -20}))
            .unwrap_err();
        assert_eq!(err.kind, "add_item");
        assert!(err.reason.contains("negative"));
    }

    #[test]
    fn test_add_item_without_amount_is_rejected() {
        assert!(CopilotAction::parse(&json!({"type": "add_item", "description": "Lights"})).is_err());
    }

    #[test]
    fn test_remove_item_requires_description() {
        assert!(CopilotAction::parse(&json!({"type": "remove_item"})).is_err());
        let action = CopilotAction::parse(&json!({"type": "remove_item", "description": "Catering"}))
            .unwrap()
            .unwrap();
        assert_eq!(
            action,
            CopilotAction::RemoveItem {
                description: "Catering".into()
            }
        );
    }

    #[test]
    fn test_update_forecast() {
        let action = CopilotAction::parse(&json!({"type": "update_forecast", "amount": 120000}))
            .unwrap()
            .unwrap();
        assert_eq!(action, CopilotAction::UpdateForecast { amount: 120000.0 });
    }

    #[test]
    fn test_unknown_kind_is_kept_not_dropped() {
        let action = CopilotAction::parse(&json!({"type": "hire_director", "name": "Ana"}))
            .unwrap()
            .unwrap();
        assert_eq!(
            action,
            CopilotAction::Unknown {
                kind: "hire_director".into()
            }
        );
    }

    #[test]
    fn test_non_object_action_is_unknown() {
        let action = CopilotAction::parse(&json!("add_item")).unwrap().unwrap();
        assert_eq!(
            action,
            CopilotAction::Unknown {
                kind: "add_item".into()
            }
        );
        assert_eq!(action.kind(), "add_item");

        let action = CopilotAction::parse(&json!(42)).unwrap().unwrap();
        assert_eq!(action.kind(), "42");
    }

    #[test]
    fn test_object_without_kind_is_no_action() {
        assert_eq!(CopilotAction::parse(&json!({})), Ok(None));
        assert_eq!(CopilotAction::parse(&json!({"description": "Catering", "amount": 10})), Ok(None));
        assert_eq!(CopilotAction::parse(&json!({"type": "  "})), Ok(None));
    }

    #[test]
    fn test_tagged_serialization() {
        let json = serde_json::to_value(CopilotAction::AddItem {
            description: "Catering".into(),
            amount: 2500.0,
        })
        .unwrap();
        assert_eq!(json, json!({"type": "add_item", "description": "Catering", "amount": 2500.0}));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_add_item_inserts_exactly_once(pool: PgPool) {
        let project_id = Uuid::new_v4();
        sqlx::query("INSERT INTO projects (id, name, forecasted_budget) VALUES ($1, 'Copilot', 10000)")
            .bind(project_id)
            .execute(&pool)
            .await
            .unwrap();

        let action = CopilotAction::AddItem {
            description: "Catering".into(),
            amount: 2500.0,
        };
        let report = apply_action(&pool, project_id, &action).await.unwrap();
        assert_eq!(report.status, ActionStatus::Applied);

        let expenses = crate::budget::ledger::list_expenses(&pool, project_id).await.unwrap();
        assert_eq!(expenses.len(), 1);
        assert_eq!(Some(expenses[0].id), report.expense_id);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_unknown_action_changes_nothing(pool: PgPool) {
        let project_id = Uuid::new_v4();
        sqlx::query("INSERT INTO projects (id, name) VALUES ($1, 'Copilot')")
            .bind(project_id)
            .execute(&pool)
            .await
            .unwrap();

        let action = CopilotAction::Unknown {
            kind: "hire_director".into(),
        };
        let report = apply_action(&pool, project_id, &action).await.unwrap();
        assert_eq!(report.status, ActionStatus::Unsupported);
        assert!(crate::budget::ledger::list_expenses(&pool, project_id)
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_rejected_report_shape() {
        let report = ActionReport::rejected(RejectedAction {
            kind: "add_item".into(),
            reason: "Amount cannot be negative.".into(),
        });
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["type"], "add_item");
        assert_eq!(json["status"], "rejected");
        assert!(json.get("expense_id").is_none());
    }
}
