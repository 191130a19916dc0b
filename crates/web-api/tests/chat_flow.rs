mod support;

use futures_util::SinkExt;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use support::{display_names, next_named, spawn_server};

#[tokio::test]
async fn posted_message_is_returned_by_latest() {
    let server = spawn_server(3500).await;
    let (token, _) = server.user("alice").await;

    for content in ["first", "hello"] {
        let response = server.send_message(&token, content).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    let latest = server.latest(&token).await;
    assert_eq!(latest.status(), StatusCode::OK);
    let items: Value = latest.json().await.unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["content"], "hello");
    assert_eq!(items[0]["senderUsername"], "alice");
    assert_eq!(items[1]["content"], "first");
}

#[tokio::test]
async fn blank_message_is_rejected() {
    let server = spawn_server(3500).await;
    let (token, _) = server.user("alice").await;

    let response = server.send_message(&token, "   ").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let latest: Value = server.latest(&token).await.json().await.unwrap();
    assert!(latest.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn hub_requires_a_valid_token() {
    let server = spawn_server(3500).await;
    let anonymous = connect_async(format!("{}/chatHub", server.base_ws)).await;
    assert!(anonymous.is_err());

    let forged = connect_async(format!("{}/chatHub?access_token=forged", server.base_ws)).await;
    assert!(forged.is_err());
}

#[tokio::test]
async fn presence_and_messages_are_broadcast_to_all_connections() {
    let server = spawn_server(3500).await;
    let (alice_token, _) = server.user("alice").await;
    let (bob_token, _) = server.user("bob").await;

    let mut alice_ws = server.connect_hub(&alice_token).await;
    let roster = next_named(&mut alice_ws, "UpdateOnlineUsers").await;
    assert_eq!(display_names(&roster), vec!["alice"]);

    let mut bob_ws = server.connect_hub(&bob_token).await;
    let roster = next_named(&mut bob_ws, "UpdateOnlineUsers").await;
    assert_eq!(display_names(&roster), vec!["alice", "bob"]);
    let roster = next_named(&mut alice_ws, "UpdateOnlineUsers").await;
    assert_eq!(display_names(&roster), vec!["alice", "bob"]);

    // HTTP 发送的消息推送给所有连接
    let response = server.send_message(&alice_token, "hi all").await;
    assert_eq!(response.status(), StatusCode::OK);
    for ws in [&mut alice_ws, &mut bob_ws] {
        let message = next_named(ws, "ReceiveMessage").await;
        assert_eq!(message["content"], "hi all");
        assert_eq!(message["senderUsername"], "alice");
    }

    // 通过 socket 发送的消息走同一条管道
    bob_ws
        .send(Message::text(
            json!({ "type": "SendMessage", "content": "from socket" }).to_string(),
        ))
        .await
        .unwrap();
    let message = next_named(&mut alice_ws, "ReceiveMessage").await;
    assert_eq!(message["content"], "from socket");
    assert_eq!(message["senderUsername"], "bob");

    bob_ws.close(None).await.unwrap();
    let roster = next_named(&mut alice_ws, "UpdateOnlineUsers").await;
    assert_eq!(display_names(&roster), vec!["alice"]);

    let latest: Value = server.latest(&alice_token).await.json().await.unwrap();
    assert_eq!(latest[0]["content"], "from socket");
}
