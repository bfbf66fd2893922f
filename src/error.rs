use thiserror::Error;

use crate::form::FieldError;
use crate::stat::{CustomerId, TransactionId};

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("customer {0} not found")]
    CustomerNotFound(CustomerId),

    #[error("transaction {0} not found")]
    TransactionNotFound(TransactionId),

    #[error("invalid input: {0}")]
    Invalid(#[from] FieldError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Deadlock detected, serialization failure.
const TRANSIENT_SQLSTATES: [&str; 2] = ["40P01", "40001"];

pub fn is_transient_sqlstate(code: &str) -> bool {
    TRANSIENT_SQLSTATES.contains(&code)
}

impl LedgerError {
    /// Storage is unreachable, overloaded or lost a lock race; the same call
    /// may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Database(sqlx::Error::Database(db_err)) => db_err
                .code()
                .is_some_and(|code| is_transient_sqlstate(&code)),
            LedgerError::Database(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Protocol(_)
                    | sqlx::Error::WorkerCrashed
            ),
            LedgerError::Io(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
