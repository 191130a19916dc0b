use application::{
    MessageView, RefreshOutcome, RegisterUserRequest, TokenPair, DEFAULT_RECENT_LIMIT,
};
use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    auth::{AdminUser, AuthUser, RefreshCaller},
    error::ApiError,
    state::AppState,
    ws_connection::WebSocketConnection,
};

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    username: String,
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshPayload {
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
struct SendMessagePayload {
    content: String,
}

#[derive(Debug, Deserialize)]
struct LatestQuery {
    limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Serialize)]
struct SentMessageResponse {
    message: MessageView,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login_user))
        .route("/auth/refresh", post(refresh_session))
        .route("/auth/logout", post(logout_user))
        .route("/messages/latest", get(latest_messages))
        .route("/messages/send", post(send_message))
        .route("/chatHub", get(chat_hub))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn register_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let identity = state
        .accounts
        .register(RegisterUserRequest {
            username: payload.username,
            email: payload.email,
            password: payload.password,
        })
        .await?;
    tracing::info!(admin_id = %admin.subject, user_id = %identity.id, "user registered by administrator");

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "User registered successfully".to_string(),
        }),
    ))
}

async fn login_user(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<Json<TokenPair>, ApiError> {
    let identity = state
        .sessions
        .login(&payload.email, &payload.password)
        .await?
        .ok_or(application::ApplicationError::InvalidCredentials)?;

    let pair = state.sessions.issue_pair(&identity).await?;
    Ok(Json(pair))
}

async fn refresh_session(
    State(state): State<AppState>,
    RefreshCaller(principal): RefreshCaller,
    Json(payload): Json<RefreshPayload>,
) -> Result<Json<TokenPair>, ApiError> {
    match state
        .sessions
        .refresh_session(&payload.refresh_token, principal.as_ref())
        .await?
    {
        RefreshOutcome::Renewed(pair) => Ok(Json(pair)),
        RefreshOutcome::Rejected(rejection) => {
            Err(application::ApplicationError::from(rejection).into())
        }
    }
}

async fn logout_user(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
) -> Result<StatusCode, ApiError> {
    state.sessions.revoke(&principal).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn latest_messages(
    State(state): State<AppState>,
    AuthUser(_principal): AuthUser,
    Query(query): Query<LatestQuery>,
) -> Result<Json<Vec<MessageView>>, ApiError> {
    let items = state
        .messages
        .get_recent(query.limit.unwrap_or(DEFAULT_RECENT_LIMIT))
        .await?;
    Ok(Json(items))
}

async fn send_message(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    Json(payload): Json<SendMessagePayload>,
) -> Result<Json<SentMessageResponse>, ApiError> {
    let message = state
        .messages
        .post(principal.subject, &payload.content)
        .await?;
    Ok(Json(SentMessageResponse { message }))
}

async fn chat_hub(
    State(state): State<AppState>,
    AuthUser(principal): AuthUser,
    ws: WebSocketUpgrade,
) -> Response {
    // 先订阅再升级，保证连接能收到自己触发的名单广播
    let connection = WebSocketConnection::new(state, principal);
    ws.on_upgrade(move |socket| connection.run(socket))
}
