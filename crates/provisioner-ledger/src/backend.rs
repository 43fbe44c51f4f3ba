use crate::error::LedgerResult;
use crate::id::RunId;
use crate::record::{LedgerRecord, RunKey};

/// Append-only storage for run ledgers.
///
/// `append` must be durable before it returns: callers rely on a record
/// surviving a crash once the call succeeds.
pub trait LedgerBackend: Send + Sync {
    /// Reserve an empty ledger for `run_id`; fails with `RunExists` when the
    /// id is taken, retired runs included.
    fn create(&self, key: &RunKey, run_id: &RunId) -> LedgerResult<()>;

    fn append(&self, run_id: &RunId, record: &LedgerRecord) -> LedgerResult<()>;

    /// All complete records in append order.
    fn read_all(&self, run_id: &RunId) -> LedgerResult<Vec<LedgerRecord>>;

    /// Runs for `key` that are not retired, in any order.
    fn list(&self, key: &RunKey) -> LedgerResult<Vec<RunId>>;

    /// Mark a run as fully rolled back; its records stay readable.
    fn retire(&self, run_id: &RunId) -> LedgerResult<()>;

    fn is_retired(&self, run_id: &RunId) -> LedgerResult<bool>;
}
