use std::collections::HashMap;
use std::sync::Arc;

use domain::ConnectionId;
use tokio::sync::RwLock;

use crate::broadcaster::{ChannelEvent, EventBroadcaster};
use crate::dto::PresenceEntry;

/// 认证信息中缺少显示名时使用的名称
pub const ANONYMOUS_DISPLAY_NAME: &str = "Anonymous";

/// 在线状态注册表
///
/// 维护 连接 → 显示名 的进程内映射，每次变更后把完整名单广播给所有连接。
/// 名单快照在同一把写锁内、变更之后立即获取；广播在释放锁之后进行。
/// 并发的连接/断开之间不保证全局顺序。
pub struct PresenceRegistry {
    entries: RwLock<HashMap<ConnectionId, String>>,
    broadcaster: Arc<dyn EventBroadcaster>,
}

impl PresenceRegistry {
    pub fn new(broadcaster: Arc<dyn EventBroadcaster>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            broadcaster,
        }
    }

    /// 记录新连接并广播名单（包括新连接自身）
    pub async fn on_connect(
        &self,
        connection_id: ConnectionId,
        display_name: Option<&str>,
    ) -> Vec<PresenceEntry> {
        let display_name = display_name
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(ANONYMOUS_DISPLAY_NAME)
            .to_owned();

        let roster = {
            let mut entries = self.entries.write().await;
            entries.insert(connection_id.clone(), display_name.clone());
            Self::snapshot(&entries)
        };

        tracing::info!(
            connection_id = %connection_id,
            display_name = %display_name,
            online = roster.len(),
            "连接已上线"
        );
        self.broadcaster
            .publish(ChannelEvent::UpdateOnlineUsers(roster.clone()));
        roster
    }

    /// 移除连接并向剩余连接广播名单。重复移除不是错误。
    pub async fn on_disconnect(
        &self,
        connection_id: &ConnectionId,
        reason: Option<&str>,
    ) -> Vec<PresenceEntry> {
        let (removed, roster) = {
            let mut entries = self.entries.write().await;
            let removed = entries.remove(connection_id);
            (removed, Self::snapshot(&entries))
        };

        match removed {
            Some(display_name) => tracing::info!(
                connection_id = %connection_id,
                display_name = %display_name,
                reason = reason.unwrap_or("closed"),
                online = roster.len(),
                "连接已下线"
            ),
            None => tracing::debug!(connection_id = %connection_id, "连接不在名单中"),
        }
        self.broadcaster
            .publish(ChannelEvent::UpdateOnlineUsers(roster.clone()));
        roster
    }

    pub async fn roster(&self) -> Vec<PresenceEntry> {
        let entries = self.entries.read().await;
        Self::snapshot(&entries)
    }

    pub async fn online_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// 进程关闭时清空名单，不再广播
    pub async fn shutdown(&self) {
        let mut entries = self.entries.write().await;
        let dropped = entries.len();
        entries.clear();
        tracing::info!(dropped, "在线状态注册表已关闭");
    }

    fn snapshot(entries: &HashMap<ConnectionId, String>) -> Vec<PresenceEntry> {
        let mut roster: Vec<PresenceEntry> = entries
            .iter()
            .map(|(connection_id, display_name)| PresenceEntry {
                connection_id: connection_id.clone(),
                display_name: display_name.clone(),
            })
            .collect();
        roster.sort_by(|a, b| a.connection_id.cmp(&b.connection_id));
        roster
    }
}
