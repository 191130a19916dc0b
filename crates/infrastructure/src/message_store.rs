use application::MessageStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{ChatMessage, MessageContent, MessageId, RepositoryError, UserId};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::db::{invalid_data, map_sqlx_err};

#[derive(Debug, FromRow)]
struct MessageRecord {
    id: Uuid,
    sender_id: Uuid,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRecord> for ChatMessage {
    type Error = RepositoryError;

    fn try_from(value: MessageRecord) -> Result<Self, Self::Error> {
        let content =
            MessageContent::new(value.content).map_err(|err| invalid_data(err.to_string()))?;
        Ok(ChatMessage {
            id: MessageId::from(value.id),
            sender_id: UserId::from(value.sender_id),
            content,
            timestamp: value.created_at,
        })
    }
}

pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn append(&self, message: ChatMessage) -> Result<MessageId, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, sender_id, content, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(Uuid::from(message.id))
        .bind(Uuid::from(message.sender_id))
        .bind(message.content.as_str())
        .bind(message.timestamp)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(message.id)
    }

    async fn latest(&self, limit: u32) -> Result<Vec<ChatMessage>, RepositoryError> {
        let records = sqlx::query_as::<_, MessageRecord>(
            r#"
            SELECT id, sender_id, content, created_at
            FROM messages
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records.into_iter().map(ChatMessage::try_from).collect()
    }
}
