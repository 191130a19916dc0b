use std::sync::Arc;

use application::{
    Clock, CredentialStore, InMemoryCredentialStore, InMemoryMessageStore, InMemoryTokenStore,
    MessageStore, PasswordHasher, TokenStore,
};
use chrono::Duration;
use config::AppConfig;
use domain::LockoutPolicy;
use sqlx::PgPool;
use thiserror::Error;

use crate::{
    credential_store::PgCredentialStore, db::create_pg_pool, message_store::PgMessageStore,
    migrations::MIGRATOR, password::BcryptPasswordHasher, token_store::PgTokenStore,
};

#[derive(Debug, Error)]
pub enum InfrastructureError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// 组装好的存储适配器
#[derive(Clone)]
pub struct Infrastructure {
    pub credential_store: Arc<dyn CredentialStore>,
    pub token_store: Arc<dyn TokenStore>,
    pub message_store: Arc<dyn MessageStore>,
    pub pool: Option<PgPool>,
}

impl Infrastructure {
    /// 连接 Postgres 并执行迁移
    pub async fn connect(
        config: &AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, InfrastructureError> {
        let pool = create_pg_pool(&config.database.url, config.database.max_connections).await?;
        MIGRATOR.run(&pool).await?;
        tracing::info!("database migrations applied");

        Ok(Self {
            credential_store: Arc::new(PgCredentialStore::new(
                pool.clone(),
                password_hasher(config),
                lockout_policy(config),
                clock.clone(),
            )),
            token_store: Arc::new(PgTokenStore::new(
                pool.clone(),
                refresh_lifespan(config),
                clock,
            )),
            message_store: Arc::new(PgMessageStore::new(pool.clone())),
            pool: Some(pool),
        })
    }

    /// 进程内存储，不需要数据库
    pub fn in_memory(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            credential_store: Arc::new(InMemoryCredentialStore::new(
                password_hasher(config),
                lockout_policy(config),
                clock.clone(),
            )),
            token_store: Arc::new(InMemoryTokenStore::new(refresh_lifespan(config), clock)),
            message_store: Arc::new(InMemoryMessageStore::new()),
            pool: None,
        }
    }
}

fn password_hasher(config: &AppConfig) -> Arc<dyn PasswordHasher> {
    Arc::new(BcryptPasswordHasher::new(config.server.bcrypt_cost))
}

fn lockout_policy(config: &AppConfig) -> LockoutPolicy {
    LockoutPolicy {
        max_failed_attempts: config.lockout.max_failed_attempts,
        lockout_seconds: config.lockout.lockout_seconds,
    }
}

pub fn refresh_lifespan(config: &AppConfig) -> Duration {
    Duration::seconds(config.refresh.token_lifespan_seconds)
}
