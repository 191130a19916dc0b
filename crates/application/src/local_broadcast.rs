// 进程内广播器实现
use tokio::sync::broadcast;

use crate::broadcaster::{ChannelEvent, EventBroadcaster};

#[derive(Clone)]
pub struct LocalEventBroadcaster {
    sender: broadcast::Sender<ChannelEvent>,
}

impl LocalEventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 每个连接在注册在线状态之前订阅，保证能收到自己触发的名单广播
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.sender.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for LocalEventBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBroadcaster for LocalEventBroadcaster {
    fn publish(&self, event: ChannelEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::debug!(event = name, receivers, "event published");
                receivers
            }
            Err(_) => {
                tracing::debug!(event = name, "no live connections, event dropped");
                0
            }
        }
    }
}

// 单个连接的事件流
pub struct EventStream {
    receiver: broadcast::Receiver<ChannelEvent>,
}

impl EventStream {
    pub fn new(receiver: broadcast::Receiver<ChannelEvent>) -> Self {
        Self { receiver }
    }

    /// 接收下一个事件。消费过慢时跳过被覆盖的事件继续接收；广播器关闭时返回 `None`。
    pub async fn recv(&mut self) -> Option<ChannelEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "connection lagging, events skipped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
