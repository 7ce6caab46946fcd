//! Recent conversation turns from the chat history table.

use pq_protocol::{ConversationTurn, Task};
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TurnRow {
    pub question: String,
    pub answer: String,
    pub task: Option<String>,
}

impl From<TurnRow> for ConversationTurn {
    fn from(row: TurnRow) -> Self {
        ConversationTurn {
            question: row.question,
            answer: row.answer,
            task: row.task.as_deref().and_then(Task::parse),
        }
    }
}

/// The last `limit` turns of `user_id`, oldest first.
pub async fn recent_turns(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<ConversationTurn>, sqlx::Error> {
    let mut rows = sqlx::query_as::<_, TurnRow>(
        "SELECT question, answer, task FROM chat_history
         WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    rows.reverse();
    Ok(rows.into_iter().map(ConversationTurn::from).collect())
}
