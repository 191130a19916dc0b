use domain::{DomainError, RepositoryError};
use thiserror::Error;

use crate::jwt::TokenError;
use crate::password::PasswordHasherError;

/// 应用层错误
///
/// 预期内的失败（凭据错误、刷新令牌无效、发送者不存在、输入不合法）和
/// 致命故障（存储不可用）使用不同变体，调用方按变体匹配，而不是笼统捕获。
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid or expired refresh token")]
    InvalidRefreshToken,
    #[error("unknown sender")]
    UnknownSender,
    #[error("validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },
    #[error("already exists: {0}")]
    Conflict(String),
    #[error("access token error: {0}")]
    Token(#[from] TokenError),
    #[error("password error: {0}")]
    Password(#[from] PasswordHasherError),
    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl ApplicationError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// 后端故障，不应向调用方暴露细节
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ApplicationError::Persistence(_)
                | ApplicationError::Password(_)
                | ApplicationError::Token(TokenError::Signing(_))
        )
    }
}

impl From<DomainError> for ApplicationError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvalidArgument { field, reason } => {
                ApplicationError::Validation { field, reason }
            }
        }
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(what) => ApplicationError::Conflict(what),
            RepositoryError::NotFound => ApplicationError::Persistence("record not found".into()),
            RepositoryError::Storage { message } => ApplicationError::Persistence(message),
        }
    }
}
