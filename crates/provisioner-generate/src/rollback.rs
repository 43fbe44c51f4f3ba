use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use provisioner_core::SchemaModel;
use provisioner_db::RowStore;
use provisioner_ledger::{Run, RunLedger};

use crate::errors::RollbackError;
use crate::model::{RollbackFailure, RollbackPartialReport, RollbackSummary, TableRollback};

/// Deletes the rows a run inserted, children before parents.
pub struct RollbackEngine {
    store: Arc<dyn RowStore>,
    ledger: RunLedger,
    statement_timeout: Duration,
    forget_missing: bool,
}

impl RollbackEngine {
    pub fn new(store: Arc<dyn RowStore>, ledger: RunLedger, statement_timeout: Duration) -> Self {
        Self {
            store,
            ledger,
            statement_timeout,
            forget_missing: false,
        }
    }

    /// Record rows that are already gone from the store as deleted instead
    /// of reporting them as failures.
    pub fn forget_missing(mut self, forget: bool) -> Self {
        self.forget_missing = forget;
        self
    }

    /// Delete every remaining row of `run` by primary key.
    ///
    /// Failed rows are collected and the pass carries on. Each deleted row is
    /// recorded at once, so a retry only sees what is left.
    pub async fn run(
        &self,
        run: &Run,
        schema: &SchemaModel,
    ) -> Result<RollbackSummary, RollbackError> {
        let run_id = run.run_id();
        if run.metadata.retired {
            info!(
                event = "rollback_skipped",
                run_id = %run_id,
                "run already rolled back"
            );
            return Ok(RollbackSummary {
                run_id: run_id.clone(),
                deleted: 0,
                already_rolled_back: true,
                tables: Vec::new(),
            });
        }

        if schema.fingerprint() != run.metadata.schema_fingerprint {
            warn!(
                event = "rollback_schema_changed",
                run_id = %run_id,
                "schema differs from the one the run was generated with"
            );
        }

        info!(
            event = "rollback_started",
            run_id = %run_id,
            rows = run.remaining(),
            finalized = run.metadata.finalized,
            "rollback started"
        );

        let mut deleted = 0_u64;
        let mut tables = Vec::new();
        let mut failures = Vec::new();

        for table_name in run.table_order.iter().rev() {
            let pks = run.rows_for(table_name);
            if pks.is_empty() {
                continue;
            }

            let Some(table) = schema.table(table_name) else {
                for pk in pks {
                    failures.push(RollbackFailure {
                        table: table_name.clone(),
                        pk: *pk,
                        reason: "table is no longer in the schema".to_string(),
                    });
                }
                continue;
            };

            let mut table_deleted = 0_u64;
            for pk in pks.iter().rev().copied() {
                let outcome = tokio::time::timeout(
                    self.statement_timeout,
                    self.store.delete_row(table_name, &table.primary_key, pk),
                )
                .await;
                let reason = match outcome {
                    Ok(Ok(true)) => match self.ledger.record_deleted(run_id, table_name, pk) {
                        Ok(()) => {
                            table_deleted += 1;
                            continue;
                        }
                        Err(err) => format!("deleted but not recorded in the ledger: {err}"),
                    },
                    Ok(Ok(false)) if self.forget_missing => {
                        match self.ledger.record_deleted(run_id, table_name, pk) {
                            Ok(()) => {
                                warn!(
                                    event = "rollback_row_forgotten",
                                    run_id = %run_id,
                                    table = %table_name,
                                    pk,
                                    "row already gone; recorded as deleted"
                                );
                                continue;
                            }
                            Err(err) => format!("row not found and not recorded: {err}"),
                        }
                    }
                    Ok(Ok(false)) => "row not found".to_string(),
                    Ok(Err(err)) => err.to_string(),
                    Err(_) => format!("timed out after {:?}", self.statement_timeout),
                };
                warn!(
                    event = "rollback_row_failed",
                    run_id = %run_id,
                    table = %table_name,
                    pk,
                    reason = %reason,
                    "row not deleted"
                );
                failures.push(RollbackFailure {
                    table: table_name.clone(),
                    pk,
                    reason,
                });
            }

            deleted += table_deleted;
            tables.push(TableRollback {
                table: table_name.clone(),
                deleted: table_deleted,
            });
        }

        if !failures.is_empty() {
            warn!(
                event = "rollback_partial",
                run_id = %run_id,
                deleted,
                failed = failures.len(),
                "rollback incomplete"
            );
            return Err(RollbackError::Partial(RollbackPartialReport {
                run_id: run_id.clone(),
                deleted,
                failures,
            }));
        }

        self.ledger.retire(run_id)?;
        info!(
            event = "rollback_finished",
            run_id = %run_id,
            deleted,
            "rollback finished"
        );
        Ok(RollbackSummary {
            run_id: run_id.clone(),
            deleted,
            already_rolled_back: false,
            tables,
        })
    }
}
