use application::{EventStream, Principal};
use axum::extract::ws::{Message as WsMessage, WebSocket};
use domain::ConnectionId;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;

use crate::state::AppState;

/// 客户端发送的指令
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientCommand {
    SendMessage { content: String },
}

/// WebSocket 写操作命令
#[derive(Debug)]
enum WsCommand {
    SendPong(Vec<u8>),
}

/// 单个 WebSocket 连接
///
/// 生命周期：订阅广播 → 注册在线状态 → 收发循环 → 注销在线状态。
/// 事件流在注册之前订阅，保证连接能收到包含自己的名单广播。
pub struct WebSocketConnection {
    state: AppState,
    principal: Principal,
    connection_id: ConnectionId,
    events: EventStream,
}

impl WebSocketConnection {
    pub fn new(state: AppState, principal: Principal) -> Self {
        let events = state.broadcaster.subscribe();
        Self {
            state,
            principal,
            connection_id: ConnectionId::generate(),
            events,
        }
    }

    pub async fn run(self, socket: WebSocket) {
        let Self {
            state,
            principal,
            connection_id,
            mut events,
        } = self;

        tracing::info!(
            connection_id = %connection_id,
            user_id = %principal.subject,
            "WebSocket 连接已建立"
        );
        state
            .presence
            .on_connect(connection_id.clone(), Some(principal.username.as_str()))
            .await;

        let (mut sender, mut incoming) = socket.split();
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<WsCommand>(32);

        // 发送任务：统一处理所有对 sender 的写操作
        let mut send_task = tokio::spawn(async move {
            loop {
                let frame = tokio::select! {
                    Some(cmd) = cmd_rx.recv() => match cmd {
                        WsCommand::SendPong(data) => WsMessage::Pong(data.into()),
                    },
                    event = events.recv() => match event {
                        Some(event) => match serde_json::to_string(&event) {
                            Ok(json) => WsMessage::Text(json.into()),
                            Err(err) => {
                                tracing::warn!(error = %err, event = event.name(), "failed to serialize event");
                                continue;
                            }
                        },
                        None => break,
                    },
                };
                if sender.send(frame).await.is_err() {
                    break;
                }
            }
        });

        // 接收任务：处理客户端指令与心跳
        let mut recv_task = {
            let state = state.clone();
            let principal = principal.clone();
            let connection_id = connection_id.clone();
            tokio::spawn(async move {
                while let Some(Ok(message)) = incoming.next().await {
                    match message {
                        WsMessage::Close(_) => return "client closed",
                        WsMessage::Ping(data) => {
                            if cmd_tx.send(WsCommand::SendPong(data.to_vec())).await.is_err() {
                                return "send channel closed";
                            }
                        }
                        WsMessage::Text(text) => {
                            handle_client_text(&state, &principal, &connection_id, text.as_str())
                                .await;
                        }
                        WsMessage::Pong(_) | WsMessage::Binary(_) => {}
                    }
                }
                "stream ended"
            })
        };

        let reason = tokio::select! {
            _ = &mut send_task => {
                recv_task.abort();
                "send failed"
            }
            reason = &mut recv_task => {
                send_task.abort();
                reason.unwrap_or("receive task aborted")
            }
        };

        state.presence.on_disconnect(&connection_id, Some(reason)).await;
        tracing::info!(
            connection_id = %connection_id,
            user_id = %principal.subject,
            reason,
            "WebSocket 连接已断开"
        );
    }
}

async fn handle_client_text(
    state: &AppState,
    principal: &Principal,
    connection_id: &ConnectionId,
    text: &str,
) {
    let command = match serde_json::from_str::<ClientCommand>(text) {
        Ok(command) => command,
        Err(err) => {
            tracing::debug!(connection_id = %connection_id, error = %err, "ignored client frame");
            return;
        }
    };

    match command {
        ClientCommand::SendMessage { content } => {
            // 成功时消息通过广播回到所有连接，包括本连接
            if let Err(err) = state.messages.post(principal.subject, &content).await {
                tracing::warn!(
                    connection_id = %connection_id,
                    user_id = %principal.subject,
                    error = %err,
                    "message from socket rejected"
                );
            }
        }
    }
}
