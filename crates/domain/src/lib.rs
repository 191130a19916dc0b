//! 聊天系统核心领域模型
//!
//! 包含身份、角色声明、聊天消息等核心实体，以及纯粹的声明推导和登录锁定规则。

pub mod claims;
pub mod errors;
pub mod identity;
pub mod lockout;
pub mod message;
pub mod value_objects;

// 重新导出常用类型
pub use claims::{derive_claims, ClaimSet, PermissionClaim, Role, ROLE_CLAIM_TYPE};
pub use errors::{DomainError, DomainResult, RepositoryError};
pub use identity::Identity;
pub use lockout::{LockoutPolicy, LockoutState};
pub use message::ChatMessage;
pub use value_objects::{
    ConnectionId, MessageContent, MessageId, PasswordHash, Timestamp, UserEmail, UserId, Username,
};
