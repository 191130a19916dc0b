//! 请求认证
//!
//! 从 `Authorization: Bearer` 头中提取访问令牌。WebSocket 握手无法设置请求头，
//! 额外接受 `access_token` 查询参数。

use application::Principal;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use domain::Role;

use crate::{error::ApiError, state::AppState};

/// 持有未过期访问令牌的调用方
#[derive(Debug, Clone)]
pub struct AuthUser(pub Principal);

/// 持有 `Administrator` 角色的调用方
#[derive(Debug, Clone)]
pub struct AdminUser(pub Principal);

/// 刷新接口的调用方：令牌可以已过期（在刷新令牌有效期内），无法识别时为 `None`
#[derive(Debug, Clone)]
pub struct RefreshCaller(pub Option<Principal>);

pub(crate) fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub(crate) fn query_token(parts: &Parts) -> Option<&str> {
    parts.uri.query()?.split('&').find_map(|pair| {
        pair.strip_prefix("access_token=")
            .filter(|token| !token.is_empty())
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .or_else(|| query_token(parts))
            .ok_or_else(|| ApiError::unauthorized("missing access token"))?;
        let principal = state.sessions.validate_access_token(token)?;
        Ok(AuthUser(principal))
    }
}

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(principal) = AuthUser::from_request_parts(parts, state).await?;
        if !principal.has_role(Role::ADMINISTRATOR) {
            tracing::info!(user_id = %principal.subject, "administrator role required");
            return Err(ApiError::forbidden("administrator role required"));
        }
        Ok(AdminUser(principal))
    }
}

impl FromRequestParts<AppState> for RefreshCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = bearer_token(parts).and_then(|token| {
            state
                .sessions
                .validate_for_refresh(token)
                .map_err(|err| tracing::debug!(error = %err, "refresh caller not identified"))
                .ok()
        });
        Ok(RefreshCaller(principal))
    }
}
