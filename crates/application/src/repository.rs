//! 外部协作者的存储契约
//!
//! 所有方法都是潜在的阻塞 I/O，调用方不得在等待期间持有任何独占锁。

use async_trait::async_trait;
use domain::{
    ChatMessage, Identity, MessageId, PermissionClaim, RepositoryError, Role, UserEmail, UserId,
};

/// 刷新令牌使用的提供者标签
pub const REFRESH_TOKEN_PROVIDER: &str = "REFRESHTOKENPROVIDER";
/// 刷新令牌使用的用途标签
pub const REFRESH_TOKEN_PURPOSE: &str = "RefreshToken";

/// 令牌记录的键：每个 (主体, 提供者, 用途) 最多一条有效记录。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenKey {
    pub subject: UserId,
    pub provider: String,
    pub purpose: String,
}

impl TokenKey {
    pub fn new(subject: UserId, provider: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            subject,
            provider: provider.into(),
            purpose: purpose.into(),
        }
    }

    pub fn refresh(subject: UserId) -> Self {
        Self::new(subject, REFRESH_TOKEN_PROVIDER, REFRESH_TOKEN_PURPOSE)
    }
}

/// 凭据存储：身份、密码、角色与角色声明。
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// 按邮箱查找，大小写不敏感
    async fn find_by_email(&self, email: &UserEmail) -> Result<Option<Identity>, RepositoryError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<Identity>, RepositoryError>;

    /// 校验密码。实现可以施加锁定策略，锁定期间总是返回 `false`。
    async fn verify_password(
        &self,
        identity: &Identity,
        plaintext: &str,
    ) -> Result<bool, RepositoryError>;

    /// 创建身份并加入给定角色，作为一个整体成功或失败。
    /// 邮箱或用户名重复时返回 `Conflict`，任一角色不存在时返回 `NotFound`。
    async fn create(
        &self,
        identity: Identity,
        plaintext: &str,
        roles: &[Role],
    ) -> Result<Identity, RepositoryError>;

    /// 角色不存在时返回 `NotFound`；重复加入是幂等的
    async fn add_to_role(&self, identity: &Identity, role: &Role) -> Result<(), RepositoryError>;

    async fn roles_of(&self, identity: &Identity) -> Result<Vec<Role>, RepositoryError>;

    async fn claims_of_role(&self, role: &Role) -> Result<Vec<PermissionClaim>, RepositoryError>;

    /// 确保角色存在并带有给定声明（缺少的声明会被补上）
    async fn ensure_role(
        &self,
        role: &Role,
        claims: &[PermissionClaim],
    ) -> Result<(), RepositoryError>;
}

/// 可撤销的不透明令牌存储
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// 生成新令牌并覆盖该键下已有的记录，返回明文令牌
    async fn issue(&self, key: &TokenKey) -> Result<String, RepositoryError>;

    /// 只校验，不消费
    async fn verify(&self, key: &TokenKey, presented: &str) -> Result<bool, RepositoryError>;

    /// 校验并原子删除。同一令牌并发消费时至多一个调用返回 `true`。
    async fn consume(&self, key: &TokenKey, presented: &str) -> Result<bool, RepositoryError>;

    async fn revoke(&self, key: &TokenKey) -> Result<(), RepositoryError>;
}

/// 消息存储：只追加
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: ChatMessage) -> Result<MessageId, RepositoryError>;

    /// 按时间倒序返回最近 `limit` 条
    async fn latest(&self, limit: u32) -> Result<Vec<ChatMessage>, RepositoryError>;
}
