use serde::{Deserialize, Serialize};

use crate::value_objects::{MessageContent, MessageId, Timestamp, UserId};

/// 持久化的聊天消息。创建后不可修改，只追加。
///
/// `sender_id` 引用身份，但领域层不强制外键，读取时再关联发送者名称。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub content: MessageContent,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn new(sender_id: UserId, content: MessageContent, timestamp: Timestamp) -> Self {
        Self {
            id: MessageId::generate(),
            sender_id,
            content,
            timestamp,
        }
    }
}
