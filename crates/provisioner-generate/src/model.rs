use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;

use provisioner_ledger::RunId;
use provisioner_scenario::ValidationIssue;

/// Options for the generation engine.
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// Probability that a nullable column receives NULL; clamped to [0, 1).
    pub null_probability: f64,
    /// Dates and datetimes fall within this many days before now.
    pub datetime_window_days: u32,
    /// Upper bound for a single insert or delete.
    pub statement_timeout: Duration,
    /// Leave columns with a declared DEFAULT to the database.
    pub skip_defaulted_columns: bool,
    /// Fixed seed for a reproducible pass; drawn at random when unset.
    pub seed: Option<u64>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            null_probability: 0.1,
            datetime_window_days: 365,
            statement_timeout: Duration::from_secs(30),
            skip_defaulted_columns: false,
            seed: None,
        }
    }
}

/// Emitted after every committed row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub run_id: RunId,
    pub table: String,
    pub table_done: u64,
    pub table_total: u64,
    pub done: u64,
    pub total: u64,
}

pub type ProgressSender = mpsc::UnboundedSender<Progress>;
pub type ProgressReceiver = mpsc::UnboundedReceiver<Progress>;

/// Create a progress stream for [`crate::GenerationEngine::run`].
pub fn progress_channel() -> (ProgressSender, ProgressReceiver) {
    mpsc::unbounded_channel()
}

/// Rows generated for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub rows_requested: u64,
    pub rows_inserted: u64,
}

/// Outcome of a completed generation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub profile: String,
    pub scenario: String,
    /// Seed the pass ran with; pass it back to reproduce the values.
    pub seed: u64,
    pub schema_fingerprint: String,
    pub tables: Vec<TableSummary>,
    pub rows: u64,
    pub warnings: Vec<ValidationIssue>,
}

/// Result of checking a scenario against a schema without touching the
/// store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub profile: String,
    pub scenario: String,
    pub schema_fingerprint: String,
    pub table_order: Vec<String>,
    pub total_rows: u64,
    pub warnings: Vec<ValidationIssue>,
}

/// Rows deleted from one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableRollback {
    pub table: String,
    pub deleted: u64,
}

/// Outcome of a rollback that removed everything it had to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackSummary {
    pub run_id: RunId,
    pub deleted: u64,
    /// The run had already been rolled back; nothing was touched.
    pub already_rolled_back: bool,
    pub tables: Vec<TableRollback>,
}

/// A row a rollback could not delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackFailure {
    pub table: String,
    pub pk: u64,
    pub reason: String,
}

/// Rollback that left rows behind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollbackPartialReport {
    pub run_id: RunId,
    pub deleted: u64,
    pub failures: Vec<RollbackFailure>,
}
