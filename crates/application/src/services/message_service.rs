use std::collections::HashMap;
use std::sync::Arc;

use domain::{ChatMessage, MessageContent, UserId};

use crate::{
    broadcaster::{ChannelEvent, EventBroadcaster},
    clock::Clock,
    dto::MessageView,
    error::ApplicationError,
    repository::{CredentialStore, MessageStore},
};

/// 默认返回的最近消息条数
pub const DEFAULT_RECENT_LIMIT: u32 = 20;
/// 单次读取的上限
pub const MAX_RECENT_LIMIT: u32 = 100;

pub struct MessageServiceDependencies {
    pub credential_store: Arc<dyn CredentialStore>,
    pub message_store: Arc<dyn MessageStore>,
    pub broadcaster: Arc<dyn EventBroadcaster>,
    pub clock: Arc<dyn Clock>,
}

/// 消息管道：先持久化，成功后再广播
pub struct MessageService {
    deps: MessageServiceDependencies,
}

impl MessageService {
    pub fn new(deps: MessageServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn post(
        &self,
        sender_id: UserId,
        content: &str,
    ) -> Result<MessageView, ApplicationError> {
        let content = MessageContent::new(content)?;
        let sender = self
            .deps
            .credential_store
            .find_by_id(sender_id)
            .await?
            .ok_or(ApplicationError::UnknownSender)?;

        let message = ChatMessage::new(sender.id, content, self.deps.clock.now());
        if let Err(err) = self.deps.message_store.append(message.clone()).await {
            tracing::error!(
                sender_id = %sender.id,
                message_id = %message.id,
                error = %err,
                "failed to persist message, not broadcasting"
            );
            return Err(ApplicationError::Persistence(err.to_string()));
        }

        let view = MessageView::new(&message, sender.username.as_str());
        let receivers = self
            .deps
            .broadcaster
            .publish(ChannelEvent::ReceiveMessage(view.clone()));
        tracing::debug!(message_id = %message.id, receivers, "message posted");
        Ok(view)
    }

    /// 按时间倒序返回最近的消息，发送者名称在读取时关联。
    /// 发送者已不存在的消息不返回。
    pub async fn get_recent(&self, limit: u32) -> Result<Vec<MessageView>, ApplicationError> {
        let limit = limit.min(MAX_RECENT_LIMIT);
        if limit == 0 {
            return Ok(Vec::new());
        }
        let messages = self.deps.message_store.latest(limit).await?;

        let mut names: HashMap<UserId, Option<String>> = HashMap::new();
        let mut views = Vec::with_capacity(messages.len());
        for message in &messages {
            if !names.contains_key(&message.sender_id) {
                let name = self
                    .deps
                    .credential_store
                    .find_by_id(message.sender_id)
                    .await?
                    .map(|identity| identity.username.as_str().to_owned());
                names.insert(message.sender_id, name);
            }
            match names.get(&message.sender_id) {
                Some(Some(name)) => views.push(MessageView::new(message, name.as_str())),
                _ => tracing::warn!(
                    message_id = %message.id,
                    sender_id = %message.sender_id,
                    "message sender not found, skipped"
                ),
            }
        }
        Ok(views)
    }
}
