//! One copilot turn: build context, ask the LLM, apply the action, log the exchange.
//!
//! The LLM being unreachable is not an error for the caller. The user gets
//! `FALLBACK_REPLY` with `degraded: true`, and that reply is logged like any other.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::budget::ledger::{format_usd, list_expenses, parse_amount, BudgetSummary};
use crate::copilot::actions::{apply_action, ActionReport, CopilotAction};
use crate::copilot::history::{append_exchange, load_recent, ChatRole, HistoryEntry};
use crate::copilot::prompts::{COPILOT_SYSTEM, FALLBACK_REPLY};
use crate::errors::AppError;
use crate::llm_client::prompts::{fill, AMOUNT_INSTRUCTION};
use crate::llm_client::{strip_json_fences, ChatTurn, LlmBackend, TurnRole};
use crate::projects::store::require_project;

pub const MAX_MESSAGE_CHARS: usize = 4000;
/// Prior messages sent to the model with each turn.
pub const HISTORY_LIMIT: i64 = 20;

/// Budget as the client currently displays it. When absent, the ledger is read
/// from the store instead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BudgetSnapshot {
    #[serde(default)]
    pub forecasted: Value,
    #[serde(default)]
    pub expenses: Vec<SnapshotExpense>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotExpense {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub amount: Value,
}

#[derive(Debug, Serialize)]
pub struct CopilotResponse {
    pub reply: String,
    pub action: Option<ActionReport>,
    /// True when the reply is the canned fallback.
    pub degraded: bool,
}

#[derive(Debug, Deserialize)]
struct RawReply {
    #[serde(default)]
    reply: String,
    #[serde(default)]
    action: Value,
}

pub fn validate_message(message: &str) -> Result<&str, AppError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::Validation("Message cannot be empty.".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(AppError::Validation(format!(
            "Message must be at most {MAX_MESSAGE_CHARS} characters."
        )));
    }
    Ok(message)
}

/// Renders a budget as the plain-text block embedded in the system prompt.
/// Unreadable snapshot amounts are listed as "unknown" and left out of totals.
pub fn describe_snapshot(snapshot: &BudgetSnapshot) -> String {
    let forecasted = parse_amount(&snapshot.forecasted).unwrap_or(0.0);
    let mut lines = Vec::with_capacity(snapshot.expenses.len());
    let mut amounts = Vec::with_capacity(snapshot.expenses.len());

    for expense in &snapshot.expenses {
        match parse_amount(&expense.amount) {
            Ok(amount) => {
                amounts.push(amount);
                lines.push(format!("- {}: {}", expense.description.trim(), format_usd(amount)));
            }
            Err(_) => lines.push(format!("- {}: unknown", expense.description.trim())),
        }
    }

    let summary = BudgetSummary::compute(forecasted, amounts);
    let mut out = format!(
        "Forecasted: {}\nSpent: {}\nRemaining: {}\n",
        summary.forecasted_display, summary.total_spent_display, summary.remaining_display
    );
    if lines.is_empty() {
        out.push_str("Expenses: none yet");
    } else {
        out.push_str("Expenses:\n");
        out.push_str(&lines.join("\n"));
    }
    out
}

/// History plus the new message as model turns: starts with a user turn and
/// alternates, merging consecutive same-role messages.
pub fn build_turns(history: &[HistoryEntry], message: &str) -> Vec<ChatTurn> {
    let mut turns: Vec<ChatTurn> = Vec::with_capacity(history.len() + 1);

    let incoming = history
        .iter()
        .skip_while(|e| e.role == ChatRole::Assistant)
        .map(HistoryEntry::to_turn)
        .chain(std::iter::once(ChatTurn::user(message)));

    for turn in incoming {
        match turns.last_mut() {
            Some(last) if last.role == turn.role => {
                last.content.push_str("\n\n");
                last.content.push_str(&turn.content);
            }
            _ => turns.push(turn),
        }
    }

    debug_assert!(turns.first().map(|t| t.role) == Some(TurnRole::User));
    turns
}

/// Reads a model reply. JSON `{reply, action}` when the model follows the
/// format; any other text is taken as the reply with no action.
pub fn parse_reply(text: &str) -> (String, Value) {
    let body = strip_json_fences(text);
    match serde_json::from_str::<RawReply>(body) {
        Ok(raw) if !raw.reply.trim().is_empty() => (raw.reply.trim().to_string(), raw.action),
        Ok(raw) => (String::new(), raw.action),
        Err(_) => (text.trim().to_string(), Value::Null),
    }
}

async fn snapshot_from_store(pool: &PgPool, project_id: Uuid, forecasted: f64) -> Result<BudgetSnapshot, AppError> {
    let expenses = list_expenses(pool, project_id).await?;
    Ok(BudgetSnapshot {
        forecasted: Value::from(forecasted),
        expenses: expenses
            .into_iter()
            .map(|e| SnapshotExpense {
                description: e.description,
                amount: Value::from(e.amount),
            })
            .collect(),
    })
}

pub async fn run_copilot_turn(
    pool: &PgPool,
    llm: &dyn LlmBackend,
    project_id: Uuid,
    message: &str,
    snapshot: Option<BudgetSnapshot>,
) -> Result<CopilotResponse, AppError> {
    let message = validate_message(message)?;
    let project = require_project(pool, project_id).await?;

    let snapshot = match snapshot {
        Some(s) => s,
        None => snapshot_from_store(pool, project_id, project.forecasted_budget).await?,
    };
    let budget = describe_snapshot(&snapshot);
    let system = fill(
        COPILOT_SYSTEM,
        &[
            ("project_name", &project.name),
            ("budget", &budget),
            ("amount_rules", AMOUNT_INSTRUCTION),
        ],
    );

    let history = load_recent(pool, project_id, HISTORY_LIMIT).await?;
    let turns = build_turns(&history, message);

    let parsed = match llm.complete(&system, &turns).await {
        Ok(response) if response.is_refusal() => {
            warn!("Copilot reply refused for project {project_id}");
            None
        }
        Ok(response) => response.text().map(parse_reply),
        Err(e) => {
            warn!("Copilot LLM call failed for project {project_id}: {e}");
            None
        }
    };

    let (reply, raw_action, degraded) = match parsed {
        Some((reply, action)) if !reply.is_empty() => (reply, action, false),
        _ => (FALLBACK_REPLY.to_string(), Value::Null, true),
    };

    let action = match CopilotAction::parse(&raw_action) {
        Ok(Some(action)) => Some(apply_action(pool, project_id, &action).await?),
        Ok(None) => None,
        Err(rejected) => {
            warn!(
                "Copilot action '{}' rejected for project {project_id}: {}",
                rejected.kind, rejected.reason
            );
            Some(ActionReport::rejected(rejected))
        }
    };

    append_exchange(pool, project_id, message, &reply).await?;
    info!(
        "Copilot turn for project {project_id} (degraded={degraded}, action={})",
        action.as_ref().map(|a| a.kind.as_str()).unwrap_or("none")
    );

    Ok(CopilotResponse {
        reply,
        action,
        degraded,
    })
}
