use std::sync::Arc;

use application::{opaque_token, Clock, TokenKey, TokenStore};
use async_trait::async_trait;
use chrono::Duration;
use domain::RepositoryError;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::map_sqlx_err;

/// 基于 Postgres 的令牌存储
///
/// 主键 (user_id, provider, purpose) 保证每个键至多一条记录；
/// 消费是一条带条件的 DELETE，并发消费同一令牌时只有一条语句删除成功。
pub struct PgTokenStore {
    pool: PgPool,
    lifespan: Duration,
    clock: Arc<dyn Clock>,
}

impl PgTokenStore {
    pub fn new(pool: PgPool, lifespan: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            pool,
            lifespan,
            clock,
        }
    }
}

#[async_trait]
impl TokenStore for PgTokenStore {
    async fn issue(&self, key: &TokenKey) -> Result<String, RepositoryError> {
        let token = opaque_token::generate()?;
        let now = self.clock.now();

        sqlx::query(
            r#"
            INSERT INTO user_tokens (user_id, provider, purpose, token_hash, expires_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id, provider, purpose)
            DO UPDATE SET token_hash = EXCLUDED.token_hash,
                          expires_at = EXCLUDED.expires_at,
                          created_at = EXCLUDED.created_at
            "#,
        )
        .bind(Uuid::from(key.subject))
        .bind(&key.provider)
        .bind(&key.purpose)
        .bind(opaque_token::fingerprint(&token))
        .bind(now + self.lifespan)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(token)
    }

    async fn verify(&self, key: &TokenKey, presented: &str) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM user_tokens
                WHERE user_id = $1 AND provider = $2 AND purpose = $3
                  AND token_hash = $4 AND expires_at > $5
            )
            "#,
        )
        .bind(Uuid::from(key.subject))
        .bind(&key.provider)
        .bind(&key.purpose)
        .bind(opaque_token::fingerprint(presented))
        .bind(self.clock.now())
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx_err)
    }

    async fn consume(&self, key: &TokenKey, presented: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            DELETE FROM user_tokens
            WHERE user_id = $1 AND provider = $2 AND purpose = $3
              AND token_hash = $4 AND expires_at > $5
            "#,
        )
        .bind(Uuid::from(key.subject))
        .bind(&key.provider)
        .bind(&key.purpose)
        .bind(opaque_token::fingerprint(presented))
        .bind(self.clock.now())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke(&self, key: &TokenKey) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"DELETE FROM user_tokens WHERE user_id = $1 AND provider = $2 AND purpose = $3"#,
        )
        .bind(Uuid::from(key.subject))
        .bind(&key.provider)
        .bind(&key.purpose)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }
}
