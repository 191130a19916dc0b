use std::collections::HashMap;
use std::sync::Arc;

use chrono::Duration;
use domain::{derive_claims, ClaimSet, Identity, UserEmail};

use crate::{
    clock::Clock,
    dto::TokenPair,
    error::ApplicationError,
    jwt::{JwtCodec, Principal, TokenError},
    repository::{CredentialStore, TokenKey, TokenStore},
};

/// 刷新被拒绝的原因，属于预期内的失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshRejection {
    /// 无法从调用方解析出身份
    Unauthenticated,
    /// 令牌缺失、不匹配、已过期或已被消费，需要重新登录
    InvalidRefreshToken,
}

impl From<RefreshRejection> for ApplicationError {
    fn from(value: RefreshRejection) -> Self {
        match value {
            RefreshRejection::Unauthenticated => ApplicationError::Unauthenticated,
            RefreshRejection::InvalidRefreshToken => ApplicationError::InvalidRefreshToken,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Renewed(TokenPair),
    Rejected(RefreshRejection),
}

pub struct SessionIssuerDependencies {
    pub credential_store: Arc<dyn CredentialStore>,
    pub token_store: Arc<dyn TokenStore>,
    pub jwt: Arc<JwtCodec>,
    pub clock: Arc<dyn Clock>,
    /// 刷新令牌有效期，同时也是刷新时过期访问令牌的宽限期
    pub refresh_token_lifespan: Duration,
}

/// 会话签发：登录、访问令牌、刷新令牌轮换
pub struct SessionIssuer {
    deps: SessionIssuerDependencies,
}

impl SessionIssuer {
    pub fn new(deps: SessionIssuerDependencies) -> Self {
        Self { deps }
    }

    /// 邮箱不存在、格式不合法或密码错误都返回 `None`，不区分原因
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Identity>, ApplicationError> {
        let Ok(email) = UserEmail::parse(email) else {
            return Ok(None);
        };
        let Some(identity) = self.deps.credential_store.find_by_email(&email).await? else {
            tracing::info!("login rejected: unknown email");
            return Ok(None);
        };

        if self
            .deps
            .credential_store
            .verify_password(&identity, password)
            .await?
        {
            tracing::info!(user_id = %identity.id, "login succeeded");
            Ok(Some(identity))
        } else {
            tracing::info!(user_id = %identity.id, "login rejected: password mismatch");
            Ok(None)
        }
    }

    /// 签发访问令牌。角色和角色声明每次都从凭据存储重新读取。
    pub async fn issue_access_token(&self, identity: &Identity) -> Result<String, ApplicationError> {
        let claims = self.claims_for(identity).await?;
        let token = self
            .deps
            .jwt
            .encode(identity, claims, self.deps.clock.now())?;
        Ok(token)
    }

    /// 签发刷新令牌，覆盖该身份之前的刷新令牌
    pub async fn issue_refresh_token(
        &self,
        identity: &Identity,
    ) -> Result<String, ApplicationError> {
        let token = self
            .deps
            .token_store
            .issue(&TokenKey::refresh(identity.id))
            .await?;
        tracing::debug!(user_id = %identity.id, "refresh token issued");
        Ok(token)
    }

    pub async fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, ApplicationError> {
        let access_token = self.issue_access_token(identity).await?;
        let refresh_token = self.issue_refresh_token(identity).await?;
        Ok(TokenPair {
            access_token,
            refresh_token,
        })
    }

    /// 用刷新令牌换取新的令牌对
    ///
    /// 旧令牌在校验的同时被原子删除；之后签发新令牌对时若存储失败，
    /// 会话无法再通过刷新恢复，只能重新登录。
    pub async fn refresh_session(
        &self,
        presented: &str,
        principal: Option<&Principal>,
    ) -> Result<RefreshOutcome, ApplicationError> {
        let Some(principal) = principal else {
            return Ok(RefreshOutcome::Rejected(RefreshRejection::Unauthenticated));
        };
        let Some(identity) = self
            .deps
            .credential_store
            .find_by_id(principal.subject)
            .await?
        else {
            tracing::info!(user_id = %principal.subject, "refresh rejected: identity no longer exists");
            return Ok(RefreshOutcome::Rejected(RefreshRejection::Unauthenticated));
        };

        let key = TokenKey::refresh(identity.id);
        if !self.deps.token_store.consume(&key, presented).await? {
            tracing::info!(user_id = %identity.id, "refresh rejected: token invalid or already used");
            return Ok(RefreshOutcome::Rejected(
                RefreshRejection::InvalidRefreshToken,
            ));
        }

        let pair = self.issue_pair(&identity).await.map_err(|err| {
            tracing::error!(user_id = %identity.id, error = %err, "failed to issue renewed session");
            err
        })?;
        tracing::info!(user_id = %identity.id, "session renewed");
        Ok(RefreshOutcome::Renewed(pair))
    }

    /// 撤销调用方的刷新令牌
    pub async fn revoke(&self, principal: &Principal) -> Result<(), ApplicationError> {
        self.deps
            .token_store
            .revoke(&TokenKey::refresh(principal.subject))
            .await?;
        tracing::info!(user_id = %principal.subject, "refresh token revoked");
        Ok(())
    }

    /// 纯令牌校验，不访问任何存储
    pub fn validate_access_token(&self, token: &str) -> Result<Principal, TokenError> {
        self.deps
            .jwt
            .decode(token, self.deps.clock.now())
            .map(Principal::from)
    }

    /// 刷新接口使用：在刷新令牌有效期内过期的访问令牌仍可用于识别身份
    pub fn validate_for_refresh(&self, token: &str) -> Result<Principal, TokenError> {
        self.deps
            .jwt
            .decode_allowing_expired(
                token,
                self.deps.refresh_token_lifespan,
                self.deps.clock.now(),
            )
            .map(Principal::from)
    }

    async fn claims_for(&self, identity: &Identity) -> Result<ClaimSet, ApplicationError> {
        let store = &self.deps.credential_store;
        let memberships = store.roles_of(identity).await?;
        let mut table = HashMap::with_capacity(memberships.len());
        for role in &memberships {
            let claims = store.claims_of_role(role).await?;
            table.insert(role.clone(), claims);
        }
        Ok(derive_claims(&memberships, &table))
    }
}
