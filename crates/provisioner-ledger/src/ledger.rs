use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::backend::LedgerBackend;
use crate::error::{LedgerError, LedgerResult};
use crate::id::RunId;
use crate::record::{LedgerRecord, RunHeader, RunKey};

/// Summary of a run for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunMetadata {
    pub run_id: RunId,
    pub profile: String,
    pub scenario: String,
    pub schema_fingerprint: String,
    pub created_at: DateTime<Utc>,
    /// False when generation stopped before its final record.
    pub finalized: bool,
    /// Rows inserted by the run.
    pub inserted: u64,
    /// Rows not yet removed by a rollback.
    pub remaining: u64,
    pub retired: bool,
}

/// A run rebuilt from its ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub metadata: RunMetadata,
    /// Tables in generation order.
    pub table_order: Vec<String>,
    /// Remaining primary keys per table, in insertion order; rows already
    /// deleted by an earlier rollback are left out.
    pub rows: Vec<(String, Vec<u64>)>,
}

impl Run {
    pub fn run_id(&self) -> &RunId {
        &self.metadata.run_id
    }

    pub fn rows_for(&self, table: &str) -> &[u64] {
        self.rows
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, ids)| ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn remaining(&self) -> u64 {
        self.rows.iter().map(|(_, ids)| ids.len() as u64).sum()
    }

    fn from_records(
        run_id: &RunId,
        records: Vec<LedgerRecord>,
        retired: bool,
    ) -> LedgerResult<Self> {
        let corrupt = |line: usize, reason: String| LedgerError::Corrupt {
            run_id: run_id.to_string(),
            line,
            reason,
        };

        let mut records = records.into_iter();
        let Some(LedgerRecord::Started {
            run_id: recorded_id,
            profile,
            scenario,
            schema_fingerprint,
            created_at,
            table_order,
        }) = records.next()
        else {
            return Err(corrupt(1, "first record is not `started`".to_string()));
        };
        if &recorded_id != run_id {
            return Err(corrupt(1, format!("ledger belongs to run `{recorded_id}`")));
        }

        let mut rows: Vec<(String, Vec<u64>)> = table_order
            .iter()
            .map(|table| (table.clone(), Vec::new()))
            .collect();
        let mut inserted = 0u64;
        let mut finalized = false;

        for (offset, record) in records.enumerate() {
            let line = offset + 2;
            match record {
                LedgerRecord::Inserted { table, pk } => {
                    let ids = rows
                        .iter_mut()
                        .find(|(name, _)| *name == table)
                        .map(|(_, ids)| ids)
                        .ok_or_else(|| {
                            corrupt(line, format!("table `{table}` is not part of the run"))
                        })?;
                    ids.push(pk);
                    inserted += 1;
                }
                LedgerRecord::Deleted { table, pk } => {
                    if let Some((_, ids)) = rows.iter_mut().find(|(name, _)| *name == table) {
                        ids.retain(|id| *id != pk);
                    }
                }
                LedgerRecord::Finalized { .. } => finalized = true,
                LedgerRecord::Started { .. } => {
                    return Err(corrupt(line, "duplicate `started` record".to_string()));
                }
            }
        }

        let remaining = rows.iter().map(|(_, ids)| ids.len() as u64).sum();
        Ok(Self {
            metadata: RunMetadata {
                run_id: recorded_id,
                profile,
                scenario,
                schema_fingerprint,
                created_at,
                finalized,
                inserted,
                remaining,
                retired,
            },
            table_order,
            rows,
        })
    }
}

/// Durable record of what each run inserted.
#[derive(Clone)]
pub struct RunLedger {
    backend: Arc<dyn LedgerBackend>,
}

impl std::fmt::Debug for RunLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLedger").finish_non_exhaustive()
    }
}

impl RunLedger {
    pub fn new(backend: Arc<dyn LedgerBackend>) -> Self {
        Self { backend }
    }

    /// Open a ledger for a new run and write its `started` record.
    pub fn begin(&self, header: RunHeader) -> LedgerResult<RunWriter> {
        let run_id = loop {
            let candidate = RunId::next();
            match self.backend.create(&header.key, &candidate) {
                Ok(()) => break candidate,
                // a later id is drawn on the next iteration
                Err(LedgerError::RunExists(_)) => continue,
                Err(err) => return Err(err),
            }
        };

        self.backend.append(
            &run_id,
            &LedgerRecord::Started {
                run_id: run_id.clone(),
                profile: header.key.profile.clone(),
                scenario: header.key.scenario.clone(),
                schema_fingerprint: header.schema_fingerprint,
                created_at: Utc::now(),
                table_order: header.table_order,
            },
        )?;

        tracing::info!(
            event = "ledger_opened",
            run_id = %run_id,
            profile = %header.key.profile,
            scenario = %header.key.scenario,
            "run ledger opened"
        );

        Ok(RunWriter {
            backend: Arc::clone(&self.backend),
            run_id,
            rows: 0,
        })
    }

    /// Runs for a profile and scenario, newest first; unfinished runs
    /// included, retired runs left out. Unreadable ledgers are logged and
    /// skipped so they cannot hide the healthy runs next to them.
    pub fn list(&self, profile: &str, scenario: &str) -> LedgerResult<Vec<RunMetadata>> {
        let mut ids = self.backend.list(&RunKey::new(profile, scenario))?;
        ids.sort_unstable_by(|left, right| right.cmp(left));
        let mut runs = Vec::with_capacity(ids.len());
        for run_id in &ids {
            match self.load(run_id) {
                Ok(run) => runs.push(run.metadata),
                Err(err @ LedgerError::Corrupt { .. }) => {
                    tracing::warn!(
                        event = "ledger_skipped",
                        run_id = %run_id,
                        error = %err,
                        "skipping unreadable run ledger"
                    );
                }
                Err(err) => return Err(err),
            }
        }
        Ok(runs)
    }

    pub fn load(&self, run_id: &RunId) -> LedgerResult<Run> {
        let records = self.backend.read_all(run_id)?;
        let retired = self.backend.is_retired(run_id)?;
        Run::from_records(run_id, records, retired)
    }

    pub fn record_deleted(&self, run_id: &RunId, table: &str, pk: u64) -> LedgerResult<()> {
        self.backend.append(
            run_id,
            &LedgerRecord::Deleted {
                table: table.to_string(),
                pk,
            },
        )
    }

    pub fn retire(&self, run_id: &RunId) -> LedgerResult<()> {
        self.backend.retire(run_id)?;
        tracing::info!(event = "ledger_retired", run_id = %run_id, "run ledger retired");
        Ok(())
    }
}

/// Append handle for the run being generated.
pub struct RunWriter {
    backend: Arc<dyn LedgerBackend>,
    run_id: RunId,
    rows: u64,
}

impl RunWriter {
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    /// Record a committed row; durable when this returns.
    pub fn append(&mut self, table: &str, pk: u64) -> LedgerResult<()> {
        self.backend.append(
            &self.run_id,
            &LedgerRecord::Inserted {
                table: table.to_string(),
                pk,
            },
        )?;
        self.rows += 1;
        Ok(())
    }

    /// Write the closing record; returns the number of rows recorded.
    pub fn finalize(self) -> LedgerResult<u64> {
        self.backend.append(
            &self.run_id,
            &LedgerRecord::Finalized {
                rows: self.rows,
                finished_at: Utc::now(),
            },
        )?;
        tracing::info!(
            event = "ledger_finalized",
            run_id = %self.run_id,
            rows = self.rows,
            "run ledger finalized"
        );
        Ok(self.rows)
    }
}
