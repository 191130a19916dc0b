//! 进程内存储实现
//!
//! 不依赖数据库，用于服务测试、HTTP 流程测试和本地开发。
//! 所有锁都不跨越 `.await` 持有（密码校验在锁外进行）。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use domain::{
    ChatMessage, Identity, LockoutPolicy, LockoutState, MessageId, PasswordHash, PermissionClaim,
    RepositoryError, Role, Timestamp, UserEmail, UserId,
};
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::opaque_token;
use crate::password::PasswordHasher;
use crate::repository::{CredentialStore, MessageStore, TokenKey, TokenStore};

struct StoredIdentity {
    identity: Identity,
    password_hash: PasswordHash,
    lockout: LockoutState,
}

#[derive(Default)]
struct CredentialState {
    identities: HashMap<UserId, StoredIdentity>,
    roles: HashMap<Role, Vec<PermissionClaim>>,
    memberships: HashMap<UserId, Vec<Role>>,
}

pub struct InMemoryCredentialStore {
    state: Mutex<CredentialState>,
    hasher: Arc<dyn PasswordHasher>,
    lockout: LockoutPolicy,
    clock: Arc<dyn Clock>,
    lookups: AtomicUsize,
}

impl InMemoryCredentialStore {
    pub fn new(
        hasher: Arc<dyn PasswordHasher>,
        lockout: LockoutPolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state: Mutex::new(CredentialState::default()),
            hasher,
            lockout,
            clock,
            lookups: AtomicUsize::new(0),
        }
    }

    /// 查询类调用的累计次数（身份、角色、角色声明）
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn record_lookup(&self) {
        self.lookups.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<Identity>, RepositoryError> {
        self.record_lookup();
        let normalized = email.normalized();
        let state = self.state.lock().await;
        Ok(state
            .identities
            .values()
            .find(|stored| stored.identity.email.normalized() == normalized)
            .map(|stored| stored.identity.clone()))
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, RepositoryError> {
        self.record_lookup();
        let state = self.state.lock().await;
        Ok(state
            .identities
            .get(&id)
            .map(|stored| stored.identity.clone()))
    }

    async fn verify_password(
        &self,
        identity: &Identity,
        plaintext: &str,
    ) -> Result<bool, RepositoryError> {
        let now = self.clock.now();
        let (hash, lockout) = {
            let state = self.state.lock().await;
            let Some(stored) = state.identities.get(&identity.id) else {
                return Ok(false);
            };
            (stored.password_hash.clone(), stored.lockout.clone())
        };
        if self.lockout.is_locked(&lockout, now) {
            tracing::warn!(user_id = %identity.id, "account locked, password check refused");
            return Ok(false);
        }

        let matches = self
            .hasher
            .verify(plaintext, &hash)
            .await
            .map_err(|err| RepositoryError::storage(err.to_string()))?;

        // 校验期间其他请求可能已触发锁定，以当前状态为准
        let mut state = self.state.lock().await;
        let Some(stored) = state.identities.get_mut(&identity.id) else {
            return Ok(false);
        };
        if self.lockout.is_locked(&stored.lockout, now) {
            tracing::warn!(user_id = %identity.id, "account locked, password check refused");
            return Ok(false);
        }
        stored.lockout = if matches {
            self.lockout.record_success()
        } else {
            let next = self.lockout.record_failure(&stored.lockout, now);
            if self.lockout.is_locked(&next, now) {
                tracing::warn!(user_id = %identity.id, "account locked after repeated failures");
            }
            next
        };
        Ok(matches)
    }

    async fn create(
        &self,
        identity: Identity,
        plaintext: &str,
        roles: &[Role],
    ) -> Result<Identity, RepositoryError> {
        let password_hash = self
            .hasher
            .hash(plaintext)
            .await
            .map_err(|err| RepositoryError::storage(err.to_string()))?;

        let mut state = self.state.lock().await;
        if roles.iter().any(|role| !state.roles.contains_key(role)) {
            return Err(RepositoryError::NotFound);
        }
        let email = identity.email.normalized();
        let username = identity.username.as_str().to_lowercase();
        for stored in state.identities.values() {
            if stored.identity.email.normalized() == email {
                return Err(RepositoryError::conflict("email already registered"));
            }
            if stored.identity.username.as_str().to_lowercase() == username {
                return Err(RepositoryError::conflict("username already taken"));
            }
        }
        state.identities.insert(
            identity.id,
            StoredIdentity {
                identity: identity.clone(),
                password_hash,
                lockout: LockoutState::default(),
            },
        );
        if !roles.is_empty() {
            state.memberships.insert(identity.id, roles.to_vec());
        }
        Ok(identity)
    }

    async fn add_to_role(&self, identity: &Identity, role: &Role) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        if !state.roles.contains_key(role) {
            return Err(RepositoryError::NotFound);
        }
        if !state.identities.contains_key(&identity.id) {
            return Err(RepositoryError::NotFound);
        }
        let memberships = state.memberships.entry(identity.id).or_default();
        if !memberships.contains(role) {
            memberships.push(role.clone());
        }
        Ok(())
    }

    async fn roles_of(&self, identity: &Identity) -> Result<Vec<Role>, RepositoryError> {
        self.record_lookup();
        let state = self.state.lock().await;
        Ok(state
            .memberships
            .get(&identity.id)
            .cloned()
            .unwrap_or_default())
    }

    async fn claims_of_role(&self, role: &Role) -> Result<Vec<PermissionClaim>, RepositoryError> {
        self.record_lookup();
        let state = self.state.lock().await;
        Ok(state.roles.get(role).cloned().unwrap_or_default())
    }

    async fn ensure_role(
        &self,
        role: &Role,
        claims: &[PermissionClaim],
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().await;
        let existing = state.roles.entry(role.clone()).or_default();
        for claim in claims {
            if !existing.contains(claim) {
                existing.push(claim.clone());
            }
        }
        Ok(())
    }
}

struct TokenRecord {
    fingerprint: String,
    expires_at: Timestamp,
}

pub struct InMemoryTokenStore {
    records: Mutex<HashMap<TokenKey, TokenRecord>>,
    lifespan: Duration,
    clock: Arc<dyn Clock>,
}

impl InMemoryTokenStore {
    pub fn new(lifespan: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            lifespan,
            clock,
        }
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

impl TokenRecord {
    fn accepts(&self, presented: &str, now: Timestamp) -> bool {
        self.expires_at > now && self.fingerprint == opaque_token::fingerprint(presented)
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn issue(&self, key: &TokenKey) -> Result<String, RepositoryError> {
        let token = opaque_token::generate()?;
        let record = TokenRecord {
            fingerprint: opaque_token::fingerprint(&token),
            expires_at: self.clock.now() + self.lifespan,
        };
        self.records.lock().await.insert(key.clone(), record);
        Ok(token)
    }

    async fn verify(&self, key: &TokenKey, presented: &str) -> Result<bool, RepositoryError> {
        let now = self.clock.now();
        let records = self.records.lock().await;
        Ok(records
            .get(key)
            .is_some_and(|record| record.accepts(presented, now)))
    }

    async fn consume(&self, key: &TokenKey, presented: &str) -> Result<bool, RepositoryError> {
        let now = self.clock.now();
        let mut records = self.records.lock().await;
        let accepted = records
            .get(key)
            .is_some_and(|record| record.accepts(presented, now));
        if accepted {
            records.remove(key);
        }
        Ok(accepted)
    }

    async fn revoke(&self, key: &TokenKey) -> Result<(), RepositoryError> {
        self.records.lock().await.remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<Vec<ChatMessage>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.messages.lock().await.len()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn append(&self, message: ChatMessage) -> Result<MessageId, RepositoryError> {
        let id = message.id;
        self.messages.lock().await.push(message);
        Ok(id)
    }

    async fn latest(&self, limit: u32) -> Result<Vec<ChatMessage>, RepositoryError> {
        let messages = self.messages.lock().await;
        // 相同时间戳时后写入的排在前面
        let mut recent: Vec<ChatMessage> = messages.iter().rev().cloned().collect();
        recent.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        recent.truncate(limit as usize);
        Ok(recent)
    }
}
