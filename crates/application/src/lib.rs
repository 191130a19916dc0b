//! 应用层实现。
//!
//! 围绕领域模型的用例服务：会话签发与刷新令牌轮换、账户注册与初始数据、
//! 消息管道、在线状态注册表，以及对外部存储和广播的抽象。

pub mod broadcaster;
pub mod clock;
pub mod dto;
pub mod error;
pub mod jwt;
pub mod local_broadcast;
pub mod memory;
pub mod opaque_token;
pub mod password;
pub mod presence;
pub mod repository;
pub mod services;

#[cfg(test)]
mod test_support;

pub use broadcaster::{ChannelEvent, EventBroadcaster};
pub use clock::{Clock, SystemClock};
pub use dto::{MessageView, PresenceEntry, TokenPair};
pub use error::ApplicationError;
pub use jwt::{AccessClaims, JwtCodec, Principal, TokenError};
pub use local_broadcast::{EventStream, LocalEventBroadcaster};
pub use memory::{InMemoryCredentialStore, InMemoryMessageStore, InMemoryTokenStore};
pub use password::{PasswordHasher, PasswordHasherError};
pub use presence::{PresenceRegistry, ANONYMOUS_DISPLAY_NAME};
pub use repository::{
    CredentialStore, MessageStore, TokenKey, TokenStore, REFRESH_TOKEN_PROVIDER,
    REFRESH_TOKEN_PURPOSE,
};
pub use services::{
    AccountService, AccountServiceDependencies, MessageService, MessageServiceDependencies,
    RefreshOutcome, RefreshRejection, RegisterUserRequest, SessionIssuer,
    SessionIssuerDependencies, DEFAULT_RECENT_LIMIT,
};
