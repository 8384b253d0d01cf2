use domain::{DomainError, RoomId, StoreError};
use thiserror::Error;

use crate::password::PasswordHasherError;
use crate::token::TokenError;

#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("handle is already taken")]
    DuplicateHandle,
    #[error("email is already registered")]
    DuplicateEmail,
    #[error("invite code is invalid or already used")]
    InvalidCode,
    #[error("invite code {code} already exists in the store")]
    CodeCollision { code: String },
    #[error("authentication required")]
    Unauthenticated,
    #[error("invalid token: {0}")]
    InvalidToken(#[source] TokenError),
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("user not found")]
    NotFound,
    #[error("room {0} not found")]
    RoomNotFound(RoomId),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("password error: {0}")]
    Password(#[from] PasswordHasherError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApplicationError {
    pub fn internal(message: impl Into<String>) -> Self {
        ApplicationError::Internal(message.into())
    }

    /// 稳定的错误码，HTTP 响应体与实时 `error` 事件共用。
    pub fn code(&self) -> &'static str {
        match self {
            ApplicationError::Domain(DomainError::MissingField { .. }) => "MISSING_FIELD",
            ApplicationError::Domain(DomainError::InvalidName { .. }) => "INVALID_NAME",
            ApplicationError::Domain(DomainError::WeakPassword { .. }) => "WEAK_PASSWORD",
            ApplicationError::Domain(DomainError::InvalidCode) | ApplicationError::InvalidCode => {
                "INVALID_CODE"
            }
            ApplicationError::Domain(DomainError::InvalidArgument { .. }) => "VALIDATION_ERROR",
            ApplicationError::DuplicateHandle => "DUPLICATE_HANDLE",
            ApplicationError::DuplicateEmail => "DUPLICATE_EMAIL",
            ApplicationError::CodeCollision { .. } => "CODE_COLLISION",
            ApplicationError::Unauthenticated => "UNAUTHENTICATED",
            ApplicationError::InvalidToken(_) => "INVALID_TOKEN",
            ApplicationError::InvalidCredentials => "INVALID_CREDENTIALS",
            ApplicationError::NotFound => "NOT_FOUND",
            ApplicationError::RoomNotFound(_) => "ROOM_NOT_FOUND",
            ApplicationError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            ApplicationError::Password(_) | ApplicationError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 服务端故障，对外只暴露通用信息。
    pub fn is_server_fault(&self) -> bool {
        matches!(
            self,
            ApplicationError::StoreUnavailable(_)
                | ApplicationError::Password(_)
                | ApplicationError::Internal(_)
                | ApplicationError::CodeCollision { .. }
        )
    }
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable { message } => ApplicationError::StoreUnavailable(message),
            other => ApplicationError::Internal(other.to_string()),
        }
    }
}
