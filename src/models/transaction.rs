use crate::error::{AppError, ErrorCategory};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Success,
    Failed,
    TimedOut,
}

/// What the chain currently says about a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptStatus {
    /// Unknown to the node yet, or not final.
    Pending,
    Accepted {
        block_number: Option<u64>,
        returned_data: Vec<u8>,
    },
    Reverted {
        reason: String,
    },
}

/// Outcome of one executor call. Built only through the constructors below.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionResult {
    tx_id: Option<String>,
    succeeded: bool,
    status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_category: Option<ErrorCategory>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    returned_data: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    block_number: Option<u64>,
    finished_at: DateTime<Utc>,
}

impl TransactionResult {
    pub(crate) fn success(tx_id: String, block_number: Option<u64>, returned_data: Vec<u8>) -> Self {
        Self {
            tx_id: Some(tx_id),
            succeeded: true,
            status: TransactionStatus::Success,
            error_category: None,
            error_code: None,
            error_message: None,
            returned_data: (!returned_data.is_empty()).then_some(returned_data),
            block_number,
            finished_at: Utc::now(),
        }
    }

    pub(crate) fn failed(tx_id: Option<String>, error: &AppError) -> Self {
        Self::with_error(tx_id, TransactionStatus::Failed, error)
    }

    pub(crate) fn timed_out(tx_id: Option<String>, error: &AppError) -> Self {
        Self::with_error(tx_id, TransactionStatus::TimedOut, error)
    }

    fn with_error(tx_id: Option<String>, status: TransactionStatus, error: &AppError) -> Self {
        Self {
            tx_id,
            succeeded: false,
            status,
            error_category: Some(error.category()),
            error_code: Some(error.code().to_string()),
            error_message: Some(error.to_string()),
            returned_data: None,
            block_number: None,
            finished_at: Utc::now(),
        }
    }

    pub fn tx_id(&self) -> Option<&str> {
        self.tx_id.as_deref()
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn error_category(&self) -> Option<ErrorCategory> {
        self.error_category
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn returned_data(&self) -> Option<&[u8]> {
        self.returned_data.as_deref()
    }

    pub fn block_number(&self) -> Option<u64> {
        self.block_number
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }
}
