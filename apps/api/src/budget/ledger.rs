//! Expense ledger: per-project line items tracked against the forecast.
//!
//! `remaining = forecasted − Σ amount` is always computed on read, never stored.
//! Callers re-read the full list after every write; there is no incremental sync.

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::expense::ExpenseRow;

pub const MAX_DESCRIPTION_CHARS: usize = 500;
pub const MAX_CATEGORY_CHARS: usize = 100;

/// A validated expense ready to insert or to overwrite a stored one.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseDraft {
    pub description: String,
    pub amount: f64,
    pub category: Option<String>,
    /// `None` lets the store use today's date.
    pub date: Option<NaiveDate>,
}

impl ExpenseDraft {
    pub fn new(description: &str, amount: f64) -> Result<Self, AppError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(AppError::Validation(
                "Expense description is required.".to_string(),
            ));
        }
        if description.chars().count() > MAX_DESCRIPTION_CHARS {
            return Err(AppError::Validation(format!(
                "Expense description must be at most {MAX_DESCRIPTION_CHARS} characters."
            )));
        }
        Ok(Self {
            description: description.to_string(),
            amount: validate_amount(amount)?,
            category: None,
            date: None,
        })
    }

    /// Blank clears the category.
    pub fn with_category(mut self, category: Option<&str>) -> Result<Self, AppError> {
        self.category = match category.map(str::trim) {
            Some("") | None => None,
            Some(c) if c.chars().count() > MAX_CATEGORY_CHARS => {
                return Err(AppError::Validation(format!(
                    "Expense category must be at most {MAX_CATEGORY_CHARS} characters."
                )))
            }
            Some(c) => Some(c.to_string()),
        };
        Ok(self)
    }

    pub fn with_date(mut self, date: Option<NaiveDate>) -> Self {
        self.date = date;
        self
    }
}

/// Finite and non-negative.
pub fn validate_amount(amount: f64) -> Result<f64, AppError> {
    if !amount.is_finite() {
        return Err(AppError::Validation("Amount must be a finite number.".to_string()));
    }
    if amount < 0.0 {
        return Err(AppError::Validation("Amount cannot be negative.".to_string()));
    }
    Ok(amount)
}

/// Parses an amount given either as a JSON number or as text like `"2500"`,
/// `"$2,500.00"` or `" 99.5 "`.
pub fn parse_amount(raw: &Value) -> Result<f64, AppError> {
    let amount = match raw {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| AppError::Validation("Amount is out of range.".to_string()))?,
        Value::String(s) => parse_amount_str(s)?,
        Value::Null => return Err(AppError::Validation("Amount is required.".to_string())),
        _ => return Err(AppError::Validation("Amount must be a number.".to_string())),
    };
    validate_amount(amount)
}

fn parse_amount_str(raw: &str) -> Result<f64, AppError> {
    let trimmed = raw.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };
    let digits: String = unsigned
        .strip_prefix('$')
        .unwrap_or(unsigned)
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    // Rust's float parser accepts "inf" and "NaN"; only plain decimals are amounts.
    let is_decimal = !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|c| *c == '.').count() <= 1
        && digits.chars().any(|c| c.is_ascii_digit());
    if !is_decimal {
        return Err(AppError::Validation(format!(
            "Amount '{raw}' is not a valid number."
        )));
    }

    let value: f64 = digits
        .parse()
        .map_err(|_| AppError::Validation(format!("Amount '{raw}' is not a valid number.")))?;
    Ok(if negative { -value } else { value })
}

/// Formats dollars the way the dashboard displays them: `$10,000`, `$2,500.50`, `-$500`.
pub fn format_usd(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = cents / 100;
    let frac = cents % 100;

    let digits = dollars.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    if frac == 0 {
        format!("{sign}${grouped}")
    } else {
        format!("{sign}${grouped}.{frac:02}")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BudgetSummary {
    pub forecasted: f64,
    pub total_spent: f64,
    pub remaining: f64,
    pub expense_count: usize,
    pub forecasted_display: String,
    pub total_spent_display: String,
    pub remaining_display: String,
}

impl BudgetSummary {
    pub fn compute(forecasted: f64, amounts: impl IntoIterator<Item = f64>) -> Self {
        let (total_spent, expense_count) = amounts
            .into_iter()
            .fold((0.0, 0usize), |(sum, n), a| (sum + a, n + 1));
        let remaining = forecasted - total_spent;
        Self {
            forecasted,
            total_spent,
            remaining,
            expense_count,
            forecasted_display: format_usd(forecasted),
            total_spent_display: format_usd(total_spent),
            remaining_display: format_usd(remaining),
        }
    }

    pub fn from_rows(forecasted: f64, expenses: &[ExpenseRow]) -> Self {
        Self::compute(forecasted, expenses.iter().map(|e| e.amount))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Store access
// ────────────────────────────────────────────────────────────────────────────

/// All expenses of a project in insertion order.
pub async fn list_expenses(pool: &PgPool, project_id: Uuid) -> Result<Vec<ExpenseRow>, sqlx::Error> {
    sqlx::query_as::<_, ExpenseRow>("SELECT * FROM expenses WHERE project_id = $1 ORDER BY seq")
        .bind(project_id)
        .fetch_all(pool)
        .await
}

pub async fn insert_expense(
    pool: &PgPool,
    project_id: Uuid,
    draft: &ExpenseDraft,
) -> Result<ExpenseRow, sqlx::Error> {
    let row = sqlx::query_as::<_, ExpenseRow>(
        r#"
        INSERT INTO expenses (id, project_id, description, amount, category, date)
        VALUES ($1, $2, $3, $4, $5, COALESCE($6, CURRENT_DATE))
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(&draft.description)
    .bind(draft.amount)
    .bind(&draft.category)
    .bind(draft.date)
    .fetch_one(pool)
    .await?;

    info!(
        "Added expense {} '{}' ({}) to project {project_id}",
        row.id, row.description, row.amount
    );
    Ok(row)
}

pub async fn find_expense(pool: &PgPool, expense_id: Uuid) -> Result<Option<ExpenseRow>, sqlx::Error> {
    sqlx::query_as::<_, ExpenseRow>("SELECT * FROM expenses WHERE id = $1")
        .bind(expense_id)
        .fetch_optional(pool)
        .await
}

/// Overwrites the editable columns of an expense that belongs to `project_id`.
/// Returns None when nothing matched. A draft without a date keeps the stored one.
pub async fn update_expense(
    pool: &PgPool,
    project_id: Uuid,
    expense_id: Uuid,
    draft: &ExpenseDraft,
) -> Result<Option<ExpenseRow>, sqlx::Error> {
    let row = sqlx::query_as::<_, ExpenseRow>(
        r#"
        UPDATE expenses
        SET description = $3, amount = $4, category = $5, date = COALESCE($6, date)
        WHERE id = $1 AND project_id = $2
        RETURNING *
        "#,
    )
    .bind(expense_id)
    .bind(project_id)
    .bind(&draft.description)
    .bind(draft.amount)
    .bind(&draft.category)
    .bind(draft.date)
    .fetch_optional(pool)
    .await?;

    if row.is_some() {
        info!("Updated expense {expense_id} in project {project_id}");
    }
    Ok(row)
}

/// Deletes an expense only if it belongs to `project_id`. Returns false when
/// nothing matched, leaving every other project's ledger untouched.
pub async fn delete_expense(
    pool: &PgPool,
    project_id: Uuid,
    expense_id: Uuid,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM expenses WHERE id = $1 AND project_id = $2")
        .bind(expense_id)
        .bind(project_id)
        .execute(pool)
        .await?;

    let deleted = result.rows_affected() > 0;
    if deleted {
        info!("Deleted expense {expense_id} from project {project_id}");
    }
    Ok(deleted)
}

/// Deletes the most recent expense whose description matches case-insensitively.
pub async fn delete_latest_matching(
    pool: &PgPool,
    project_id: Uuid,
    description: &str,
) -> Result<Option<ExpenseRow>, sqlx::Error> {
    sqlx::query_as::<_, ExpenseRow>(
        r#"
        DELETE FROM expenses
        WHERE id = (
            SELECT id FROM expenses
            WHERE project_id = $1 AND LOWER(description) = LOWER($2)
            ORDER BY seq DESC
            LIMIT 1
        )
        RETURNING *
        "#,
    )
    .bind(project_id)
    .bind(description.trim())
    .fetch_optional(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_catering_scenario() {
        let before = BudgetSummary::compute(10_000.0, Vec::<f64>::new());
        assert_eq!(before.forecasted_display, "$10,000");
        assert_eq!(before.total_spent_display, "$0");
        assert_eq!(before.remaining_display, "$10,000");

        let draft = ExpenseDraft::new("Catering", parse_amount(&json!(2500)).unwrap()).unwrap();
        let after = BudgetSummary::compute(10_000.0, [draft.amount]);
        assert_eq!(after.total_spent_display, "$2,500");
        assert_eq!(after.remaining_display, "$7,500");
        assert_eq!(after.expense_count, 1);
    }

    #[test]
    fn test_remaining_is_forecast_minus_sum() {
        let amounts = [1200.0, 300.25, 0.0, 99.75];
        let summary = BudgetSummary::compute(5_000.0, amounts);
        assert!((summary.total_spent - 1600.0).abs() < 1e-9);
        assert!((summary.remaining - 3400.0).abs() < 1e-9);
    }

    #[test]
    fn test_overspend_goes_negative() {
        let summary = BudgetSummary::compute(1_000.0, [1_500.0]);
        assert_eq!(summary.remaining_display, "-$500");
    }

    #[test]
    fn test_format_usd_grouping_and_cents() {
        assert_eq!(format_usd(0.0), "$0");
        assert_eq!(format_usd(999.0), "$999");
        assert_eq!(format_usd(1_000.0), "$1,000");
        assert_eq!(format_usd(1_234_567.5), "$1,234,567.50");
        assert_eq!(format_usd(-0.001), "$0");
    }

    #[test]
    fn test_parse_amount_accepts_numbers_and_text() {
        assert_eq!(parse_amount(&json!(2500)).unwrap(), 2500.0);
        assert_eq!(parse_amount(&json!(12.5)).unwrap(), 12.5);
        assert_eq!(parse_amount(&json!("2500")).unwrap(), 2500.0);
        assert_eq!(parse_amount(&json!("$2,500.00")).unwrap(), 2500.0);
        assert_eq!(parse_amount(&json!(" 99.5 ")).unwrap(), 99.5);
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        for raw in [
            json!("abc"),
            json!(""),
            json!("NaN"),
            json!("inf"),
            json!("1.2.3"),
            json!("$"),
            json!(true),
            json!(null),
            json!([1]),
        ] {
            assert!(
                matches!(parse_amount(&raw), Err(AppError::Validation(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_negative_amounts_rejected() {
        assert!(parse_amount(&json!(-1)).is_err());
        assert!(parse_amount(&json!("-$40")).is_err());
        assert!(validate_amount(f64::NAN).is_err());
        assert!(validate_amount(f64::INFINITY).is_err());
        assert_eq!(validate_amount(0.0).unwrap(), 0.0);
    }

    async fn seed_project(pool: &PgPool, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO projects (id, name, forecasted_budget) VALUES ($1, $2, 10000)")
            .bind(id)
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
        id
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_delete_is_scoped_to_project(pool: PgPool) {
        let ours = seed_project(&pool, "Ours").await;
        let theirs = seed_project(&pool, "Theirs").await;
        let draft = ExpenseDraft::new("Catering", 2500.0).unwrap();
        let their_expense = insert_expense(&pool, theirs, &draft).await.unwrap();

        assert!(!delete_expense(&pool, ours, their_expense.id).await.unwrap());
        assert_eq!(list_expenses(&pool, theirs).await.unwrap().len(), 1);

        assert!(delete_expense(&pool, theirs, their_expense.id).await.unwrap());
        assert!(list_expenses(&pool, theirs).await.unwrap().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_summary_after_delete_only_counts_what_is_left(pool: PgPool) {
        let project = seed_project(&pool, "Summary").await;
        let catering = insert_expense(&pool, project, &ExpenseDraft::new("Catering", 2500.0).unwrap())
            .await
            .unwrap();
        insert_expense(&pool, project, &ExpenseDraft::new("Lights", 1200.0).unwrap())
            .await
            .unwrap();

        assert!(delete_expense(&pool, project, catering.id).await.unwrap());

        let left = list_expenses(&pool, project).await.unwrap();
        let summary = BudgetSummary::from_rows(10_000.0, &left);
        assert_eq!(summary.expense_count, 1);
        assert_eq!(summary.total_spent_display, "$1,200");
        assert_eq!(summary.remaining_display, "$8,800");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_update_keeps_date_and_respects_project(pool: PgPool) {
        let ours = seed_project(&pool, "Ours").await;
        let theirs = seed_project(&pool, "Theirs").await;
        let day = NaiveDate::from_ymd_opt(2025, 4, 2).unwrap();
        let draft = ExpenseDraft::new("Catering", 2500.0)
            .unwrap()
            .with_category(Some("Crew"))
            .unwrap()
            .with_date(Some(day));
        let expense = insert_expense(&pool, ours, &draft).await.unwrap();
        assert_eq!(expense.date, day);
        assert_eq!(expense.category.as_deref(), Some("Crew"));

        let edit = ExpenseDraft::new("Catering (2 days)", 3000.0).unwrap();
        assert!(update_expense(&pool, theirs, expense.id, &edit).await.unwrap().is_none());

        let updated = update_expense(&pool, ours, expense.id, &edit).await.unwrap().unwrap();
        assert_eq!(updated.amount, 3000.0);
        assert_eq!(updated.date, day);
        assert_eq!(updated.category, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_delete_latest_matching_takes_newest(pool: PgPool) {
        let project = seed_project(&pool, "Remove").await;
        let first = insert_expense(&pool, project, &ExpenseDraft::new("Catering", 100.0).unwrap())
            .await
            .unwrap();
        let second = insert_expense(&pool, project, &ExpenseDraft::new("catering", 200.0).unwrap())
            .await
            .unwrap();

        let removed = delete_latest_matching(&pool, project, "CATERING").await.unwrap().unwrap();
        assert_eq!(removed.id, second.id);

        let left = list_expenses(&pool, project).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, first.id);
        assert!(delete_latest_matching(&pool, project, "Lights").await.unwrap().is_none());
    }

    #[test]
    fn test_category_is_optional_and_bounded() {
        let draft = ExpenseDraft::new("Gaffer tape", 40.0).unwrap();
        assert_eq!(draft.clone().with_category(Some(" Grip ")).unwrap().category.as_deref(), Some("Grip"));
        assert_eq!(draft.clone().with_category(Some("")).unwrap().category, None);
        assert!(draft
            .with_category(Some(&"c".repeat(MAX_CATEGORY_CHARS + 1)))
            .is_err());
    }

    #[test]
    fn test_draft_trims_and_requires_description() {
        let draft = ExpenseDraft::new("  Camera rental ", 800.0).unwrap();
        assert_eq!(draft.description, "Camera rental");
        assert!(ExpenseDraft::new("   ", 10.0).is_err());
        assert!(ExpenseDraft::new(&"x".repeat(MAX_DESCRIPTION_CHARS + 1), 10.0).is_err());
    }
}
