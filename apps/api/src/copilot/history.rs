//! Append-only copilot chat log, one per project.
//!
//! Order is the `seq` column, not `created_at`: a user message and its reply are
//! written in one statement and share a timestamp.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::llm_client::ChatTurn;
use crate::models::chat::ChatMessageRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "user" => Some(ChatRole::User),
            "assistant" => Some(ChatRole::Assistant),
            _ => None,
        }
    }
}

/// Wire shape of one history message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub text: String,
    pub role: ChatRole,
}

impl HistoryEntry {
    /// Rows with a role outside the CHECK constraint cannot exist; they are
    /// dropped rather than surfaced.
    pub fn from_row(row: ChatMessageRow) -> Option<Self> {
        Some(Self {
            role: ChatRole::parse(&row.role)?,
            text: row.text,
        })
    }

    pub fn to_turn(&self) -> ChatTurn {
        match self.role {
            ChatRole::User => ChatTurn::user(self.text.clone()),
            ChatRole::Assistant => ChatTurn::assistant(self.text.clone()),
        }
    }
}

/// Full history of a project, oldest first.
pub async fn load_history(pool: &PgPool, project_id: Uuid) -> Result<Vec<HistoryEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ChatMessageRow>(
        "SELECT * FROM chat_messages WHERE project_id = $1 ORDER BY seq",
    )
    .bind(project_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(HistoryEntry::from_row).collect())
}

/// The last `limit` messages of a project, oldest first.
pub async fn load_recent(
    pool: &PgPool,
    project_id: Uuid,
    limit: i64,
) -> Result<Vec<HistoryEntry>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ChatMessageRow>(
        r#"
        SELECT * FROM (
            SELECT * FROM chat_messages
            WHERE project_id = $1
            ORDER BY seq DESC
            LIMIT $2
        ) recent
        ORDER BY seq
        "#,
    )
    .bind(project_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().filter_map(HistoryEntry::from_row).collect())
}

/// Stores a user message and the reply to it. Both rows land or neither does.
pub async fn append_exchange(
    pool: &PgPool,
    project_id: Uuid,
    user_text: &str,
    assistant_text: &str,
) -> Result<(), sqlx::Error> {
    // BIGSERIAL defaults are drawn in VALUES order, so the user row gets the lower seq.
    sqlx::query(
        r#"
        INSERT INTO chat_messages (id, project_id, role, text)
        VALUES ($1, $3, $4, $5), ($2, $3, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(Uuid::new_v4())
    .bind(project_id)
    .bind(ChatRole::User.as_str())
    .bind(user_text)
    .bind(ChatRole::Assistant.as_str())
    .bind(assistant_text)
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::llm_client::TurnRole;

    fn row(role: &str, text: &str, seq: i64) -> ChatMessageRow {
        ChatMessageRow {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            role: role.to_string(),
            text: text.to_string(),
            seq,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_entry_from_row() {
        let entry = HistoryEntry::from_row(row("assistant", "Added catering.", 2)).unwrap();
        assert_eq!(entry.role, ChatRole::Assistant);
        assert_eq!(entry.text, "Added catering.");
        assert!(HistoryEntry::from_row(row("system", "x", 3)).is_none());
    }

    #[test]
    fn test_entry_serializes_lowercase_role() {
        let entry = HistoryEntry {
            text: "hi".into(),
            role: ChatRole::User,
        };
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({"text": "hi", "role": "user"})
        );
    }

    #[test]
    fn test_entry_to_turn() {
        let turn = HistoryEntry {
            text: "ok".into(),
            role: ChatRole::Assistant,
        }
        .to_turn();
        assert_eq!(turn.role, TurnRole::Assistant);
        assert_eq!(turn.content, "ok");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "requires DATABASE_URL"]
    async fn test_exchange_order_is_preserved(pool: PgPool) {
        let project_id = Uuid::new_v4();
        sqlx::query("INSERT INTO projects (id, name) VALUES ($1, 'History')")
            .bind(project_id)
            .execute(&pool)
            .await
            .unwrap();

        append_exchange(&pool, project_id, "add catering", "Added catering.").await.unwrap();
        append_exchange(&pool, project_id, "what's left?", "$7,500 remains.").await.unwrap();

        let history = load_history(&pool, project_id).await.unwrap();
        let texts: Vec<_> = history.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, ["add catering", "Added catering.", "what's left?", "$7,500 remains."]);
        assert_eq!(history[0].role, ChatRole::User);
        assert_eq!(history[1].role, ChatRole::Assistant);

        let recent = load_recent(&pool, project_id, 2).await.unwrap();
        assert_eq!(recent[0].text, "what's left?");
        assert_eq!(recent[1].text, "$7,500 remains.");
    }
}
