use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Coarse failure taxonomy handed to callers for retry decisions and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    ContractRevert,
    UserRejected,
    Validation,
    Permission,
    Timeout,
    Unknown,
}

impl ErrorCategory {
    /// Stable identifier, identical to the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::ContractRevert => "contract_revert",
            ErrorCategory::UserRejected => "user_rejected",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Permission => "permission",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Categories that never succeed on a blind retry.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ErrorCategory::UserRejected | ErrorCategory::Permission | ErrorCategory::Validation
        )
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Execution reverted: {}", revert_text(.reason, .message))]
    ContractRevert {
        reason: Option<String>,
        message: String,
    },

    #[error("User rejected the request: {0}")]
    UserRejected(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    #[error("Nonce conflict: {0}")]
    NonceConflict(String),

    #[error("Gas limit exceeded: {0}")]
    GasLimitExceeded(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

fn revert_text<'a>(reason: &'a Option<String>, message: &'a str) -> &'a str {
    reason.as_deref().unwrap_or(message)
}

impl AppError {
    pub fn revert(reason: Option<String>, message: impl Into<String>) -> Self {
        AppError::ContractRevert {
            reason,
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AppError::Network(_) => ErrorCategory::Network,
            AppError::Timeout(_) => ErrorCategory::Timeout,
            AppError::ContractRevert { .. }
            | AppError::InsufficientBalance(_)
            | AppError::NonceConflict(_)
            | AppError::GasLimitExceeded(_) => ErrorCategory::ContractRevert,
            AppError::UserRejected(_) => ErrorCategory::UserRejected,
            AppError::PermissionDenied(_) => ErrorCategory::Permission,
            AppError::Validation(_) => ErrorCategory::Validation,
            AppError::Unknown(_) | AppError::Internal(_) => ErrorCategory::Unknown,
        }
    }

    /// Fine-grained stable code, finer than [`ErrorCategory`].
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Network(_) => "NETWORK_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::ContractRevert { .. } => "CONTRACT_REVERT",
            AppError::UserRejected(_) => "USER_REJECTED",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InsufficientBalance(_) => "INSUFFICIENT_BALANCE",
            AppError::NonceConflict(_) => "NONCE_CONFLICT",
            AppError::GasLimitExceeded(_) => "GAS_LIMIT_EXCEEDED",
            AppError::Unknown(_) => "UNKNOWN_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn revert_reason(&self) -> Option<&str> {
        match self {
            AppError::ContractRevert { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: self.code().to_string(),
                category: self.category(),
                message: self.to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub category: ErrorCategory,
    pub message: String,
}

pub type Result<T> = std::result::Result<T, AppError>;
