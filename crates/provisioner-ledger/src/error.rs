use thiserror::Error;

/// Run ledger and lease errors.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("run `{0}` not found")]
    RunNotFound(String),
    #[error("run `{0}` already exists")]
    RunExists(String),
    #[error("invalid run id `{0}`: expected 17 digits (YYYYMMDDHHMMSSmmm)")]
    InvalidRunId(String),
    #[error("ledger for run `{run_id}` is corrupt at line {line}: {reason}")]
    Corrupt {
        run_id: String,
        line: usize,
        reason: String,
    },
    #[error("another provisioner pass holds the lease ({0})")]
    LeaseUnavailable(String),
    #[error("ledger state lock poisoned")]
    Poisoned,
}

/// Result type for ledger operations.
pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
