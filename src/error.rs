//! Error types for market-ledger

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// Transport failure talking to the remote ledger. Safe to retry.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response from the remote ledger.
    #[error("Remote ledger returned {status}: {message}")]
    Http { status: u16, message: String },

    /// Malformed response from the remote ledger. Not retryable.
    #[error("Malformed remote response: {0}")]
    Decode(String),

    #[error("Receipt token not found: {0}")]
    TokenNotFound(i64),

    #[error("Receipt token already consumed: {0}")]
    TokenAlreadyConsumed(i64),

    /// A payment with this remote-assigned id already exists locally.
    /// Signals that a remote acknowledgment was already applied.
    #[error("Payment already recorded: {0}")]
    DuplicatePaymentId(i64),

    #[error("Payment not found: {0}")]
    PaymentNotFound(i64),

    /// Disk or transaction failure in the local store.
    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            LedgerError::Decode(e.to_string())
        } else {
            LedgerError::Network(e.to_string())
        }
    }
}

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;
