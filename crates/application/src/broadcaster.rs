use serde::{Deserialize, Serialize};

use crate::dto::{MessageView, PresenceEntry};

/// 推送给所有在线连接的实时事件
///
/// 序列化为 `{"event": "...", "payload": ...}`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum ChannelEvent {
    UpdateOnlineUsers(Vec<PresenceEntry>),
    ReceiveMessage(MessageView),
}

impl ChannelEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChannelEvent::UpdateOnlineUsers(_) => "UpdateOnlineUsers",
            ChannelEvent::ReceiveMessage(_) => "ReceiveMessage",
        }
    }
}

/// 扇出广播
///
/// 发布立即返回；对单个连接的投递失败不影响其他连接，也不重试，
/// 失败的连接只通过自身的断开通知清理。返回值为接收该事件的订阅者数量。
pub trait EventBroadcaster: Send + Sync {
    fn publish(&self, event: ChannelEvent) -> usize;
}
