// SPDX-License-Identifier: MIT

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Initialization failed: {0}")]
    Initialization(String),

    #[error("Connection failed to endpoint: {0}")]
    Connection(String),

    #[error("External API error: {provider} responded with {status}")]
    ApiCall { provider: String, status: u16 },

    #[error("Transaction failed: {hash:?}, reason: {reason}")]
    Transaction { hash: Option<String>, reason: String },

    #[error("Insufficient funds. Required: {required}, Available: {available}")]
    InsufficientFunds { required: String, available: String },

    #[error("Validation failed for field {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Address {0} is invalid")]
    InvalidAddress(String),

    #[error("Vault error: {0}")]
    Vault(String),

    #[error(
        "Partial execution of order {order_id}: {completed_steps} step(s) confirmed before failure: {reason}"
    )]
    PartialExecution {
        order_id: i64,
        completed_steps: usize,
        reason: String,
    },

    #[error("Order {order_id} already reached a terminal state")]
    TerminalConflict { order_id: i64 },

    #[error(transparent)]
    Unknown(#[from] anyhow::Error),
}

impl AppError {
    /// Transient failures leave the order ACTIVE and are retried on a
    /// later monitor tick.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::Connection(_) | AppError::ApiCall { .. } | AppError::Transaction { .. }
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Initialization(format!("Store operation failed: {err}"))
    }
}
