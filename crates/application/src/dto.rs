use domain::{ChatMessage, ConnectionId, MessageId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// 访问令牌与刷新令牌
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TokenPair { .. }")
    }
}

/// 对外展示的消息，带有读取时关联的发送者名称
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: MessageId,
    pub content: String,
    pub sender_id: UserId,
    pub sender_username: String,
    pub timestamp: Timestamp,
}

impl MessageView {
    pub fn new(message: &ChatMessage, sender_username: impl Into<String>) -> Self {
        Self {
            id: message.id,
            content: message.content.as_str().to_owned(),
            sender_id: message.sender_id,
            sender_username: sender_username.into(),
            timestamp: message.timestamp,
        }
    }
}

/// 在线名单中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub connection_id: ConnectionId,
    pub display_name: String,
}
