use application::{ApplicationError, TokenError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", message)
    }

    pub fn internal_server_error() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "internal server error",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<TokenError> for ApiError {
    fn from(error: TokenError) -> Self {
        match error {
            TokenError::Expired => {
                ApiError::new(StatusCode::UNAUTHORIZED, "TOKEN_EXPIRED", "access token expired")
            }
            TokenError::Invalid(_) => {
                ApiError::new(StatusCode::UNAUTHORIZED, "INVALID_TOKEN", "invalid access token")
            }
            TokenError::Signing(reason) => {
                tracing::error!(error = %reason, "access token signing failed");
                ApiError::internal_server_error()
            }
        }
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        use application::ApplicationError as AppErr;

        match error {
            AppErr::Unauthenticated => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "UNAUTHENTICATED",
                "authentication required",
            ),
            AppErr::InvalidCredentials => ApiError::new(
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "invalid email or password",
            ),
            AppErr::InvalidRefreshToken => ApiError::new(
                StatusCode::BAD_REQUEST,
                "INVALID_REFRESH_TOKEN",
                "invalid or expired refresh token",
            ),
            AppErr::UnknownSender => {
                ApiError::new(StatusCode::BAD_REQUEST, "UNKNOWN_SENDER", "sender not found")
            }
            AppErr::Validation { field, reason } => ApiError::new(
                StatusCode::BAD_REQUEST,
                "VALIDATION_FAILED",
                format!("{field}: {reason}"),
            ),
            AppErr::Conflict(what) => ApiError::new(StatusCode::CONFLICT, "CONFLICT", what),
            AppErr::Token(err) => err.into(),
            fatal @ (AppErr::Password(_) | AppErr::Persistence(_)) => {
                // 细节只写日志，不返回给调用方
                tracing::error!(error = %fatal, "request failed");
                ApiError::internal_server_error()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_details_are_not_leaked() {
        let error = ApiError::from(ApplicationError::Persistence(
            "connection refused at 10.0.0.3".into(),
        ));
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!error.body.message.contains("10.0.0.3"));
    }

    #[test]
    fn expected_failures_map_to_client_errors() {
        let cases = [
            (ApplicationError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (ApplicationError::InvalidRefreshToken, StatusCode::BAD_REQUEST),
            (ApplicationError::UnknownSender, StatusCode::BAD_REQUEST),
            (
                ApplicationError::validation("content", "cannot be empty"),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApplicationError::Token(TokenError::Expired),
                StatusCode::UNAUTHORIZED,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(ApiError::from(error).status(), status);
        }
    }
}
