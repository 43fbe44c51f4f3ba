use std::fmt;
use std::time::Duration;

use thiserror::Error;

use provisioner_core::SchemaParseError;
use provisioner_db::DbError;
use provisioner_ledger::{LedgerError, RunId};
use provisioner_scenario::ResolveError;

use crate::model::RollbackPartialReport;

/// Where a pass stopped: the row being inserted and the last row known to
/// be committed and recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowContext {
    pub run_id: RunId,
    pub table: String,
    /// Zero-based index of the row within its table.
    pub row: u64,
    pub last_committed: Option<(String, u64)>,
}

impl fmt::Display for RowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {} table `{}` row {}", self.run_id, self.table, self.row)?;
        match &self.last_committed {
            Some((table, pk)) => write!(f, " (last committed `{table}` pk {pk})"),
            None => write!(f, " (nothing committed)"),
        }
    }
}

/// Errors emitted by the generation engine.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Schema(#[from] SchemaParseError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(
        "relation `{table}.{column}` draws from `{parent}`, which has no rows in this run"
    )]
    EmptyParentPool {
        table: String,
        column: String,
        parent: String,
    },
    #[error("insert failed at {at}: {source}")]
    Storage {
        at: RowContext,
        #[source]
        source: DbError,
    },
    #[error("insert timed out after {timeout:?} at {at}")]
    Timeout { at: RowContext, timeout: Duration },
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("invalid value for `{table}.{column}` in run {run_id}: {reason}")]
    InvalidValue {
        run_id: RunId,
        table: String,
        column: String,
        reason: String,
    },
}

/// Errors emitted by the rollback engine.
#[derive(Debug, Error)]
pub enum RollbackError {
    #[error(
        "rollback of run {} incomplete: {} row(s) left behind",
        .0.run_id,
        .0.failures.len()
    )]
    Partial(RollbackPartialReport),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

/// Errors surfaced by [`crate::Provisioner`].
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Rollback(#[from] RollbackError),
    #[error("ledger error: {0}")]
    Ledger(LedgerError),
    #[error("another pass holds the lease: {0}")]
    LeaseUnavailable(String),
}

impl From<LedgerError> for ProvisionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::LeaseUnavailable(holder) => ProvisionError::LeaseUnavailable(holder),
            other => ProvisionError::Ledger(other),
        }
    }
}

impl From<ResolveError> for ProvisionError {
    fn from(err: ResolveError) -> Self {
        ProvisionError::Generation(GenerationError::Resolve(err))
    }
}
