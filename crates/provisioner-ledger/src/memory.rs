use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::backend::LedgerBackend;
use crate::error::{LedgerError, LedgerResult};
use crate::id::RunId;
use crate::record::{LedgerRecord, RunKey};

/// Ledger kept in process memory, for dry runs and tests.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    runs: Mutex<BTreeMap<RunId, MemoryRun>>,
}

#[derive(Debug)]
struct MemoryRun {
    key: RunKey,
    records: Vec<LedgerRecord>,
    retired: bool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_run<T>(
        &self,
        run_id: &RunId,
        apply: impl FnOnce(&mut MemoryRun) -> T,
    ) -> LedgerResult<T> {
        let mut runs = self.runs.lock().map_err(|_| LedgerError::Poisoned)?;
        let run = runs
            .get_mut(run_id)
            .ok_or_else(|| LedgerError::RunNotFound(run_id.to_string()))?;
        Ok(apply(run))
    }
}

impl LedgerBackend for MemoryLedger {
    fn create(&self, key: &RunKey, run_id: &RunId) -> LedgerResult<()> {
        let mut runs = self.runs.lock().map_err(|_| LedgerError::Poisoned)?;
        if runs.contains_key(run_id) {
            return Err(LedgerError::RunExists(run_id.to_string()));
        }
        runs.insert(
            run_id.clone(),
            MemoryRun {
                key: key.clone(),
                records: Vec::new(),
                retired: false,
            },
        );
        Ok(())
    }

    fn append(&self, run_id: &RunId, record: &LedgerRecord) -> LedgerResult<()> {
        self.with_run(run_id, |run| run.records.push(record.clone()))
    }

    fn read_all(&self, run_id: &RunId) -> LedgerResult<Vec<LedgerRecord>> {
        self.with_run(run_id, |run| run.records.clone())
    }

    fn list(&self, key: &RunKey) -> LedgerResult<Vec<RunId>> {
        let runs = self.runs.lock().map_err(|_| LedgerError::Poisoned)?;
        Ok(runs
            .iter()
            .filter(|(_, run)| &run.key == key && !run.retired)
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn retire(&self, run_id: &RunId) -> LedgerResult<()> {
        self.with_run(run_id, |run| run.retired = true)
    }

    fn is_retired(&self, run_id: &RunId) -> LedgerResult<bool> {
        self.with_run(run_id, |run| run.retired)
    }
}
