#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use application::SystemClock;
use config::{AppConfig, SeedConfig};
use futures_util::StreamExt;
use infrastructure::Infrastructure;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use web_api::{router, AppState};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const USER_PASSWORD: &str = "Passw0rd!";

pub struct TestServer {
    pub base_http: String,
    pub base_ws: String,
    pub client: Client,
    _shutdown: oneshot::Sender<()>,
}

pub fn admin_seed() -> SeedConfig {
    SeedConfig::default()
}

/// 使用进程内存储启动服务，监听随机端口
pub async fn spawn_server(access_token_ttl_seconds: i64) -> TestServer {
    let mut config = AppConfig::default();
    config.jwt.secret = "integration-test-secret-with-at-least-32-chars".to_string();
    config.jwt.access_token_ttl_seconds = access_token_ttl_seconds;
    config.server.bcrypt_cost = Some(4);

    let clock = Arc::new(SystemClock);
    let infra = Infrastructure::in_memory(&config, clock.clone());
    let state = AppState::build(&config, &infra, clock);
    state
        .accounts
        .seed_defaults(&config.seed)
        .await
        .expect("seed defaults");

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let app = router(state);

    tokio::spawn(async move {
        axum::serve(listener, app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .ok();
    });

    TestServer {
        base_http: format!("http://{addr}"),
        base_ws: format!("ws://{addr}"),
        client: Client::new(),
        _shutdown: shutdown_tx,
    }
}

impl TestServer {
    pub async fn login(&self, email: &str, password: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/auth/login", self.base_http))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request")
    }

    /// 登录并返回 (accessToken, refreshToken)
    pub async fn login_ok(&self, email: &str, password: &str) -> (String, String) {
        let response = self.login(email, password).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.expect("login json");
        (
            body["accessToken"].as_str().expect("accessToken").to_string(),
            body["refreshToken"].as_str().expect("refreshToken").to_string(),
        )
    }

    pub async fn login_admin(&self) -> (String, String) {
        let seed = admin_seed();
        self.login_ok(&seed.admin_email, &seed.admin_password).await
    }

    pub async fn register(
        &self,
        bearer: Option<&str>,
        username: &str,
        email: &str,
        password: &str,
    ) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!("{}/auth/register", self.base_http))
            .json(&json!({ "username": username, "email": email, "password": password }));
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("register request")
    }

    /// 由管理员注册一个普通用户并登录
    pub async fn user(&self, username: &str) -> (String, String) {
        let (admin_token, _) = self.login_admin().await;
        let email = format!("{username}@example.com");
        let response = self
            .register(Some(&admin_token), username, &email, USER_PASSWORD)
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        self.login_ok(&email, USER_PASSWORD).await
    }

    pub async fn refresh(&self, bearer: Option<&str>, refresh_token: &str) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!("{}/auth/refresh", self.base_http))
            .json(&json!({ "refreshToken": refresh_token }));
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("refresh request")
    }

    pub async fn send_message(&self, bearer: &str, content: &str) -> reqwest::Response {
        self.client
            .post(format!("{}/messages/send", self.base_http))
            .bearer_auth(bearer)
            .json(&json!({ "content": content }))
            .send()
            .await
            .expect("send request")
    }

    pub async fn latest(&self, bearer: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/messages/latest", self.base_http))
            .bearer_auth(bearer)
            .send()
            .await
            .expect("latest request")
    }

    pub async fn connect_hub(&self, access_token: &str) -> WsClient {
        let url = format!("{}/chatHub?access_token={access_token}", self.base_ws);
        let (stream, _) = connect_async(url).await.expect("websocket connect");
        stream
    }
}

/// 读取下一条 JSON 事件，跳过非文本帧
pub async fn next_event(ws: &mut WsClient) -> Value {
    loop {
        let frame = timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("event within timeout")
            .expect("stream open")
            .expect("frame");
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).expect("event json");
        }
    }
}

/// 读取直到出现指定事件
pub async fn next_named(ws: &mut WsClient, name: &str) -> Value {
    loop {
        let event = next_event(ws).await;
        if event["event"] == name {
            return event["payload"].clone();
        }
    }
}

pub fn display_names(roster: &Value) -> Vec<String> {
    let mut names: Vec<String> = roster
        .as_array()
        .expect("roster array")
        .iter()
        .map(|entry| entry["displayName"].as_str().unwrap_or_default().to_string())
        .collect();
    names.sort();
    names
}
