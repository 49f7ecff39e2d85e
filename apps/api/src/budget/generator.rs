//! Budget generation from a saved script breakdown.
//!
//! Flow: load project → require analysis → LLM drafts line items → validate each
//! line → insert valid lines as expenses → re-read the ledger.
//!
//! Lines are inserted one statement at a time. A failure midway leaves the
//! lines written so far in place.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::budget::ledger::{insert_expense, list_expenses, parse_amount, ExpenseDraft};
use crate::budget::prompts::{BUDGET_DRAFT_PROMPT, BUDGET_DRAFT_SYSTEM};
use crate::errors::AppError;
use crate::llm_client::prompts::{fill, json_only_system, AMOUNT_INSTRUCTION};
use crate::llm_client::{call_json, LlmBackend};
use crate::models::expense::ExpenseRow;
use crate::projects::store::require_project;

/// Cap on lines accepted from a single generation call.
pub const MAX_GENERATED_ITEMS: usize = 40;

#[derive(Debug, Deserialize)]
struct DraftBudget {
    #[serde(default)]
    items: Vec<DraftLine>,
}

#[derive(Debug, Deserialize)]
struct DraftLine {
    #[serde(default)]
    description: String,
    #[serde(default)]
    amount: Value,
}

#[derive(Debug, Serialize)]
pub struct GenerateBudgetResponse {
    pub created: usize,
    pub skipped: usize,
    /// Full ledger after the insertions.
    pub expenses: Vec<ExpenseRow>,
}

/// Validated lines plus the number of lines dropped.
#[derive(Debug)]
pub struct DraftedLines {
    pub lines: Vec<ExpenseDraft>,
    pub skipped: usize,
}

fn validate_lines(draft: DraftBudget) -> DraftedLines {
    let mut lines = Vec::new();
    let mut skipped = 0;

    for (i, line) in draft.items.into_iter().enumerate() {
        if i >= MAX_GENERATED_ITEMS {
            skipped += 1;
            continue;
        }
        let valid = parse_amount(&line.amount)
            .and_then(|amount| ExpenseDraft::new(&line.description, amount));
        match valid {
            Ok(expense) => lines.push(expense),
            Err(e) => {
                warn!("Skipping drafted budget line '{}': {e}", line.description);
                skipped += 1;
            }
        }
    }

    DraftedLines { lines, skipped }
}

/// Asks the LLM for budget lines. Does not touch the store.
pub async fn draft_budget_lines(
    analysis: &Value,
    forecasted: f64,
    llm: &dyn LlmBackend,
) -> Result<DraftedLines, AppError> {
    let analysis_json = serde_json::to_string_pretty(analysis).map_err(|e| AppError::Internal(e.into()))?;
    let forecast = format!("{forecasted:.2}");
    let max_items = MAX_GENERATED_ITEMS.to_string();
    let prompt = fill(
        BUDGET_DRAFT_PROMPT,
        &[
            ("analysis", &analysis_json),
            ("forecast", &forecast),
            ("max_items", &max_items),
            ("amount_rules", AMOUNT_INSTRUCTION),
        ],
    );

    let draft: DraftBudget = call_json(llm, &prompt, &json_only_system(BUDGET_DRAFT_SYSTEM))
        .await
        .map_err(|e| AppError::llm(format!("Budget generation failed: {e}")))?;

    Ok(validate_lines(draft))
}

/// Drafts budget lines for a project from its stored analysis and persists them.
pub async fn generate_budget_from_script(
    pool: &PgPool,
    llm: &dyn LlmBackend,
    project_id: Uuid,
) -> Result<GenerateBudgetResponse, AppError> {
    let project = require_project(pool, project_id).await?;
    let analysis = project.analysis.ok_or_else(|| {
        AppError::UnprocessableEntity(
            "Analyze and save the script before generating a budget.".to_string(),
        )
    })?;

    info!("Drafting budget lines for project {project_id}");
    let drafted = draft_budget_lines(&analysis, project.forecasted_budget, llm).await?;

    for line in &drafted.lines {
        insert_expense(pool, project_id, line).await?;
    }

    info!(
        "Budget generation for project {project_id}: {} created, {} skipped",
        drafted.lines.len(),
        drafted.skipped
    );

    Ok(GenerateBudgetResponse {
        created: drafted.lines.len(),
        skipped: drafted.skipped,
        expenses: list_expenses(pool, project_id).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::{Scripted, ScriptedLlm};
    use serde_json::json;

    #[tokio::test]
    async fn test_valid_and_invalid_lines_are_split() {
        let llm = ScriptedLlm::replying(
            r#"{"items": [
                {"description": "Cast - JOHN", "amount": 4500},
                {"description": "Location - OFFICE", "amount": "$1,200"},
                {"description": "", "amount": 10},
                {"description": "Refund", "amount": -300},
                {"description": "Mystery", "amount": "lots"}
            ]}"#,
        );
        let drafted = draft_budget_lines(&json!({"estimated_scenes": 1}), 10_000.0, &llm)
            .await
            .unwrap();

        assert_eq!(drafted.lines.len(), 2);
        assert_eq!(drafted.lines[0].description, "Cast - JOHN");
        assert_eq!(drafted.lines[1].amount, 1200.0);
        assert_eq!(drafted.skipped, 3);
    }

    #[tokio::test]
    async fn test_prompt_carries_analysis_and_forecast() {
        let llm = ScriptedLlm::replying(r#"{"items": []}"#);
        draft_budget_lines(&json!({"props": ["red balloon"]}), 2500.0, &llm)
            .await
            .unwrap();
        let prompt = &llm.last_turns()[0].content;
        assert!(prompt.contains("red balloon"));
        assert!(prompt.contains("2500.00"));
        assert!(!prompt.contains("{amount_rules}"));
    }

    #[tokio::test]
    async fn test_items_beyond_cap_are_skipped() {
        let items: Vec<_> = (0..MAX_GENERATED_ITEMS + 5)
            .map(|i| json!({"description": format!("Line {i}"), "amount": 1}))
            .collect();
        let llm = ScriptedLlm::replying(&json!({ "items": items }).to_string());
        let drafted = draft_budget_lines(&json!({}), 0.0, &llm).await.unwrap();
        assert_eq!(drafted.lines.len(), MAX_GENERATED_ITEMS);
        assert_eq!(drafted.skipped, 5);
    }

    #[tokio::test]
    async fn test_llm_failure_is_an_llm_error() {
        let llm = ScriptedLlm::new(vec![Scripted::Fail("timeout".into())]);
        let err = draft_budget_lines(&json!({}), 0.0, &llm).await.unwrap_err();
        assert!(matches!(err, AppError::Llm { .. }));
    }
}
