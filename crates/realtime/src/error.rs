//! Error taxonomy for the relay.

use thiserror::Error;
use urlyn_database::StoreError;

/// Machine-readable reason a connection was refused at authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingToken,
    InvalidToken,
    ExpiredToken,
    UnknownUser,
}

impl AuthRejection {
    pub fn code(&self) -> &'static str {
        match self {
            AuthRejection::MissingToken => "missing_token",
            AuthRejection::InvalidToken => "invalid_token",
            AuthRejection::ExpiredToken => "expired_token",
            AuthRejection::UnknownUser => "unknown_user",
        }
    }
}

/// Errors surfaced by the relay.
///
/// Authentication refuses the connection; everything else is reported to
/// the originating connection as an `error` event and leaves it open.
#[derive(Debug, Error)]
pub enum RealtimeError {
    #[error("authentication refused: {}", .0.code())]
    Authentication(AuthRejection),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RealtimeError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// The human-readable text carried by the `error` event.
    pub fn client_message(&self) -> String {
        match self {
            RealtimeError::Authentication(reason) => {
                format!("authentication refused: {}", reason.code())
            }
            RealtimeError::Forbidden(message)
            | RealtimeError::NotFound(message)
            | RealtimeError::Validation(message) => message.clone(),
            // Store internals stay server-side
            RealtimeError::Store(StoreError::Validation { message }) => message.clone(),
            RealtimeError::Store(StoreError::ChatNotFound { id }) => {
                format!("Chat not found: {id}")
            }
            RealtimeError::Store(StoreError::MessageNotFound { id }) => {
                format!("Message not found: {id}")
            }
            RealtimeError::Store(StoreError::UserNotFound { id }) => {
                format!("User not found: {id}")
            }
            RealtimeError::Store(StoreError::Database(_)) => {
                "Internal error, please retry".to_string()
            }
        }
    }

    /// The machine-readable code carried alongside, when one applies.
    pub fn client_code(&self) -> Option<&'static str> {
        match self {
            RealtimeError::Authentication(reason) => Some(reason.code()),
            _ => None,
        }
    }
}

pub type RealtimeResult<T> = Result<T, RealtimeError>;
