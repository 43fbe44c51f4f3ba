//! Record generation and rollback for provisioner runs.
//!
//! The engine inserts synthetic rows for a resolved scenario and records
//! every committed row in the run ledger; the rollback engine uses that
//! ledger to delete exactly those rows again.

pub mod engine;
pub mod errors;
pub mod model;
pub mod rollback;
pub mod service;
pub mod values;

pub use engine::{GenerationEngine, check_parent_pools};
pub use errors::{GenerationError, ProvisionError, RollbackError, RowContext};
pub use model::{
    GenerateOptions, Progress, ProgressReceiver, ProgressSender, RollbackFailure,
    RollbackPartialReport, RollbackSummary, RunSummary, TableRollback, TableSummary,
    ValidationOutcome, progress_channel,
};
pub use rollback::RollbackEngine;
pub use service::{Provisioner, Request, Response, ScenarioInput};
pub use values::{MAX_DATETIME_WINDOW_DAYS, ValueGenerator};
