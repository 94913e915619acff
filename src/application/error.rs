use std::time::Duration;

use thiserror::Error;

use crate::domain::{TransactionStatus, ValidationError};

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid account name: '{0}'")]
    InvalidAccountName(String),

    #[error("Account already exists: {0}")]
    AccountAlreadyExists(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Illegal status transition for {transaction_id}: {from} -> {to}")]
    IllegalTransition {
        transaction_id: String,
        from: TransactionStatus,
        to: TransactionStatus,
    },

    #[error("Storage operation '{operation}' timed out after {limit:?}")]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LedgerError {
    /// The offending field, for validation failures.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            LedgerError::Validation(err) => Some(err.field()),
            _ => None,
        }
    }

    /// Storage failures and timeouts may succeed if the caller tries again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, LedgerError::Storage(_) | LedgerError::Timeout { .. })
    }
}
