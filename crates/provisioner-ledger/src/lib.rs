//! Run ledger: an append-only, crash-tolerant record of every row a
//! generation pass inserted, plus the exclusive lease guarding passes.

pub mod backend;
pub mod error;
pub mod file;
pub mod id;
pub mod lease;
pub mod ledger;
pub mod memory;
pub mod record;

pub use backend::LedgerBackend;
pub use error::{LedgerError, LedgerResult};
pub use file::FileLedger;
pub use id::RunId;
pub use lease::{FileLease, LeaseGuard, LeaseProvider, ProcessLease};
pub use ledger::{Run, RunLedger, RunMetadata, RunWriter};
pub use memory::MemoryLedger;
pub use record::{LedgerRecord, RunHeader, RunKey};
