use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::RunId;

/// Profile and scenario a run belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    pub profile: String,
    pub scenario: String,
}

impl RunKey {
    pub fn new(profile: impl Into<String>, scenario: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            scenario: scenario.into(),
        }
    }
}

/// What is known about a run before its first insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunHeader {
    pub key: RunKey,
    pub schema_fingerprint: String,
    /// Tables in generation order.
    pub table_order: Vec<String>,
}

/// One line of a run ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum LedgerRecord {
    Started {
        run_id: RunId,
        profile: String,
        scenario: String,
        schema_fingerprint: String,
        created_at: DateTime<Utc>,
        table_order: Vec<String>,
    },
    Inserted {
        table: String,
        pk: u64,
    },
    Finalized {
        rows: u64,
        finished_at: DateTime<Utc>,
    },
    Deleted {
        table: String,
        pk: u64,
    },
}
