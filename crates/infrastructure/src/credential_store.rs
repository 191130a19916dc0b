use std::sync::Arc;

use application::{Clock, CredentialStore, PasswordHasher};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Identity, LockoutPolicy, LockoutState, PasswordHash, PermissionClaim, RepositoryError, Role,
    UserEmail, UserId, Username,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::db::{invalid_data, map_sqlx_err};

#[derive(Debug, FromRow)]
struct IdentityRecord {
    id: Uuid,
    username: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<IdentityRecord> for Identity {
    type Error = RepositoryError;

    fn try_from(value: IdentityRecord) -> Result<Self, Self::Error> {
        let username =
            Username::parse(value.username).map_err(|err| invalid_data(err.to_string()))?;
        let email = UserEmail::parse(value.email).map_err(|err| invalid_data(err.to_string()))?;
        Ok(Identity::new(
            UserId::from(value.id),
            username,
            email,
            value.created_at,
        ))
    }
}

#[derive(Debug, FromRow)]
struct PasswordRecord {
    password_hash: String,
    failed_attempts: i32,
    lockout_until: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct LockoutRecord {
    failed_attempts: i32,
    lockout_until: Option<DateTime<Utc>>,
}

impl From<LockoutRecord> for LockoutState {
    fn from(value: LockoutRecord) -> Self {
        LockoutState {
            failed_attempts: value.failed_attempts.max(0) as u32,
            locked_until: value.lockout_until,
        }
    }
}

#[derive(Debug, FromRow)]
struct ClaimRecord {
    claim_type: String,
    claim_value: String,
}

/// 基于 Postgres 的凭据存储，密码校验时施加登录锁定
pub struct PgCredentialStore {
    pool: PgPool,
    hasher: Arc<dyn PasswordHasher>,
    lockout: LockoutPolicy,
    clock: Arc<dyn Clock>,
}

impl PgCredentialStore {
    pub fn new(
        pool: PgPool,
        hasher: Arc<dyn PasswordHasher>,
        lockout: LockoutPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            pool,
            hasher,
            lockout,
            clock,
        }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<Identity>, RepositoryError> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            SELECT id, username, email, created_at
            FROM users
            WHERE normalized_email = $1
            "#,
        )
        .bind(email.normalized())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Identity::try_from).transpose()
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, RepositoryError> {
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"SELECT id, username, email, created_at FROM users WHERE id = $1"#,
        )
        .bind(Uuid::from(id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        record.map(Identity::try_from).transpose()
    }

    async fn verify_password(
        &self,
        identity: &Identity,
        plaintext: &str,
    ) -> Result<bool, RepositoryError> {
        let Some(record) = sqlx::query_as::<_, PasswordRecord>(
            r#"SELECT password_hash, failed_attempts, lockout_until FROM users WHERE id = $1"#,
        )
        .bind(Uuid::from(identity.id))
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_err)?
        else {
            return Ok(false);
        };

        let now = self.clock.now();
        let state = LockoutState::from(LockoutRecord {
            failed_attempts: record.failed_attempts,
            lockout_until: record.lockout_until,
        });
        if self.lockout.is_locked(&state, now) {
            tracing::warn!(user_id = %identity.id, "account locked, password check refused");
            return Ok(false);
        }

        let hash =
            PasswordHash::new(record.password_hash).map_err(|err| invalid_data(err.to_string()))?;
        let matches = self
            .hasher
            .verify(plaintext, &hash)
            .await
            .map_err(|err| RepositoryError::storage(err.to_string()))?;

        // 锁定状态在行锁下重新读取，并发的失败尝试依次累加
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let Some(current) = sqlx::query_as::<_, LockoutRecord>(
            r#"SELECT failed_attempts, lockout_until FROM users WHERE id = $1 FOR UPDATE"#,
        )
        .bind(Uuid::from(identity.id))
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_err)?
        else {
            return Ok(false);
        };
        let state = LockoutState::from(current);
        if self.lockout.is_locked(&state, now) {
            tracing::warn!(user_id = %identity.id, "account locked, password check refused");
            return Ok(false);
        }

        let next = if matches {
            self.lockout.record_success()
        } else {
            self.lockout.record_failure(&state, now)
        };
        if next != state {
            sqlx::query(
                r#"UPDATE users SET failed_attempts = $2, lockout_until = $3 WHERE id = $1"#,
            )
            .bind(Uuid::from(identity.id))
            .bind(next.failed_attempts as i32)
            .bind(next.locked_until)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        }
        tx.commit().await.map_err(map_sqlx_err)?;

        if self.lockout.is_locked(&next, now) {
            tracing::warn!(user_id = %identity.id, "account locked after repeated failures");
        }
        Ok(matches)
    }

    async fn create(
        &self,
        identity: Identity,
        plaintext: &str,
        roles: &[Role],
    ) -> Result<Identity, RepositoryError> {
        let hash = self
            .hasher
            .hash(plaintext)
            .await
            .map_err(|err| RepositoryError::storage(err.to_string()))?;

        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;
        let record = sqlx::query_as::<_, IdentityRecord>(
            r#"
            INSERT INTO users (id, username, normalized_username, email, normalized_email, password_hash, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, username, email, created_at
            "#,
        )
        .bind(Uuid::from(identity.id))
        .bind(identity.username.as_str())
        .bind(identity.username.as_str().to_lowercase())
        .bind(identity.email.as_str())
        .bind(identity.email.normalized())
        .bind(hash.as_str())
        .bind(identity.created_at)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_err)?;

        // 角色不存在时外键约束失败，整个事务回滚
        for role in roles {
            sqlx::query(r#"INSERT INTO user_roles (user_id, role_name) VALUES ($1, $2)"#)
                .bind(record.id)
                .bind(&role.name)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_err)?;
        }
        tx.commit().await.map_err(map_sqlx_err)?;

        Identity::try_from(record)
    }

    async fn add_to_role(&self, identity: &Identity, role: &Role) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO user_roles (user_id, role_name)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::from(identity.id))
        .bind(&role.name)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_err)?;
        Ok(())
    }

    async fn roles_of(&self, identity: &Identity) -> Result<Vec<Role>, RepositoryError> {
        let names: Vec<String> = sqlx::query_scalar(
            r#"SELECT role_name FROM user_roles WHERE user_id = $1 ORDER BY role_name"#,
        )
        .bind(Uuid::from(identity.id))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(names.into_iter().map(Role::new).collect())
    }

    async fn claims_of_role(&self, role: &Role) -> Result<Vec<PermissionClaim>, RepositoryError> {
        let records = sqlx::query_as::<_, ClaimRecord>(
            r#"SELECT claim_type, claim_value FROM role_claims WHERE role_name = $1"#,
        )
        .bind(&role.name)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_err)?;

        records
            .into_iter()
            .map(|record| {
                PermissionClaim::new(record.claim_type, record.claim_value)
                    .map_err(|err| invalid_data(err.to_string()))
            })
            .collect()
    }

    async fn ensure_role(
        &self,
        role: &Role,
        claims: &[PermissionClaim],
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_err)?;

        sqlx::query(r#"INSERT INTO roles (name) VALUES ($1) ON CONFLICT DO NOTHING"#)
            .bind(&role.name)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;

        for claim in claims {
            sqlx::query(
                r#"
                INSERT INTO role_claims (role_name, claim_type, claim_value)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(&role.name)
            .bind(&claim.claim_type)
            .bind(&claim.value)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_err)?;
        }

        tx.commit().await.map_err(map_sqlx_err)?;
        Ok(())
    }
}
