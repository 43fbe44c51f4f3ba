use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, error, info};

use provisioner_core::{Column, GeneratedValue, SchemaModel};
use provisioner_db::RowStore;
use provisioner_ledger::{RunHeader, RunId, RunKey, RunLedger};
use provisioner_scenario::{ResolvedScenario, ResolvedTable};

use crate::errors::{GenerationError, RowContext};
use crate::model::{GenerateOptions, Progress, ProgressSender, RunSummary, TableSummary};
use crate::values::ValueGenerator;

const MAX_UNIQUE_ATTEMPTS: u32 = 50;

/// Inserts the rows of a resolved scenario and records each one in the run
/// ledger as soon as the store confirms it.
pub struct GenerationEngine {
    store: Arc<dyn RowStore>,
    ledger: RunLedger,
    options: GenerateOptions,
}

impl GenerationEngine {
    pub fn new(store: Arc<dyn RowStore>, ledger: RunLedger, options: GenerateOptions) -> Self {
        Self {
            store,
            ledger,
            options,
        }
    }

    /// Run one generation pass.
    ///
    /// Rows are inserted one at a time in scenario order. A failure stops the
    /// pass; rows committed before it stay in the store and in the ledger.
    pub async fn run(
        &self,
        key: RunKey,
        schema: &SchemaModel,
        resolved: &ResolvedScenario<'_>,
        progress: Option<&ProgressSender>,
    ) -> Result<RunSummary, GenerationError> {
        check_parent_pools(resolved)?;

        let seed = self.options.seed.unwrap_or_else(|| rand::rng().random());
        let values = ValueGenerator::new(
            self.options.null_probability,
            self.options.datetime_window_days,
        );
        let schema_fingerprint = schema.fingerprint();
        let mut writer = self.ledger.begin(RunHeader {
            key: key.clone(),
            schema_fingerprint: schema_fingerprint.clone(),
            table_order: resolved.table_order(),
        })?;
        let run_id = writer.run_id().clone();
        let total = resolved.total_rows();

        info!(
            event = "run_started",
            run_id = %run_id,
            profile = %key.profile,
            scenario = %key.scenario,
            store = self.store.engine(),
            tables = resolved.tables.len(),
            rows = total,
            seed,
            "generation started"
        );

        let builder = RowBuilder {
            values: &values,
            skip_defaulted: self.options.skip_defaulted_columns,
            run_id: &run_id,
        };
        let mut pools: Vec<Vec<u64>> = vec![Vec::new(); resolved.tables.len()];
        let mut last_committed: Option<(String, u64)> = None;
        let mut done = 0_u64;
        let mut tables = Vec::with_capacity(resolved.tables.len());

        for (index, resolved_table) in resolved.tables.iter().enumerate() {
            let table = resolved_table.table;
            if resolved_table.count > 0 {
                info!(
                    event = "table_started",
                    run_id = %run_id,
                    table = %table.name,
                    rows = resolved_table.count,
                    "generating table"
                );
            }

            let mut rng = ChaCha8Rng::seed_from_u64(hash_seed(seed, &table.name));
            let mut uniques = UniqueValues::default();

            for row in 0..resolved_table.count {
                let (columns, row_values) =
                    builder.build(resolved_table, &pools, &mut uniques, &mut rng)?;
                let at = || RowContext {
                    run_id: run_id.clone(),
                    table: table.name.clone(),
                    row,
                    last_committed: last_committed.clone(),
                };

                let inserted = tokio::time::timeout(
                    self.options.statement_timeout,
                    self.store.insert_row(&table.name, &columns, &row_values),
                )
                .await;
                let pk = match inserted {
                    Ok(Ok(pk)) => pk,
                    Ok(Err(source)) => {
                        let at = at();
                        error!(
                            event = "row_insert_failed",
                            run_id = %run_id,
                            table = %table.name,
                            row,
                            error = %source,
                            "insert failed; run left partial"
                        );
                        return Err(GenerationError::Storage { at, source });
                    }
                    Err(_) => {
                        let at = at();
                        error!(
                            event = "row_insert_timeout",
                            run_id = %run_id,
                            table = %table.name,
                            row,
                            timeout_ms = self.options.statement_timeout.as_millis() as u64,
                            "insert timed out; run left partial"
                        );
                        return Err(GenerationError::Timeout {
                            at,
                            timeout: self.options.statement_timeout,
                        });
                    }
                };

                if let Err(err) = writer.append(&table.name, pk) {
                    error!(
                        event = "ledger_append_failed",
                        run_id = %run_id,
                        table = %table.name,
                        pk,
                        error = %err,
                        "row committed but not recorded; remove it by hand"
                    );
                    return Err(err.into());
                }
                pools[index].push(pk);
                last_committed = Some((table.name.clone(), pk));
                done += 1;

                debug!(
                    event = "row_inserted",
                    run_id = %run_id,
                    table = %table.name,
                    pk,
                    "row inserted"
                );
                if let Some(progress) = progress {
                    // a dropped receiver only stops progress reporting
                    let _ = progress.send(Progress {
                        run_id: run_id.clone(),
                        table: table.name.clone(),
                        table_done: row + 1,
                        table_total: resolved_table.count,
                        done,
                        total,
                    });
                }
            }

            tables.push(TableSummary {
                table: table.name.clone(),
                rows_requested: resolved_table.count,
                rows_inserted: pools[index].len() as u64,
            });
        }

        let rows = writer.finalize()?;
        info!(
            event = "run_finalized",
            run_id = %run_id,
            rows,
            "generation finished"
        );

        Ok(RunSummary {
            run_id,
            profile: key.profile,
            scenario: key.scenario,
            seed,
            schema_fingerprint,
            tables,
            rows,
            warnings: resolved.warnings.clone(),
        })
    }
}

/// Fail when a table with rows draws a relation from a parent that gets
/// none.
pub fn check_parent_pools(resolved: &ResolvedScenario<'_>) -> Result<(), GenerationError> {
    for child in resolved.tables.iter().filter(|table| table.count > 0) {
        for relation in &child.relations {
            if resolved.tables[relation.parent_index].count == 0 {
                return Err(GenerationError::EmptyParentPool {
                    table: child.table.name.clone(),
                    column: relation.column.name.clone(),
                    parent: relation.parent.name.clone(),
                });
            }
        }
    }
    Ok(())
}

struct RowBuilder<'g> {
    values: &'g ValueGenerator,
    skip_defaulted: bool,
    run_id: &'g RunId,
}

impl RowBuilder<'_> {
    /// Column names and values for one insert, in declaration order.
    fn build<'t>(
        &self,
        resolved: &ResolvedTable<'t>,
        pools: &[Vec<u64>],
        uniques: &mut UniqueValues,
        rng: &mut ChaCha8Rng,
    ) -> Result<(Vec<&'t str>, Vec<GeneratedValue>), GenerationError> {
        let table = resolved.table;
        let mut columns = Vec::with_capacity(table.columns.len());
        let mut values = Vec::with_capacity(table.columns.len());

        for column in table.columns.iter().filter(|column| column.is_insertable()) {
            let value = match resolved.relation_for(&column.name) {
                Some(relation) => {
                    let pool = &pools[relation.parent_index];
                    if pool.is_empty() {
                        return Err(GenerationError::EmptyParentPool {
                            table: table.name.clone(),
                            column: column.name.clone(),
                            parent: relation.parent.name.clone(),
                        });
                    }
                    let pk = pool[rng.random_range(0..pool.len())];
                    let pk = i64::try_from(pk).map_err(|_| {
                        self.invalid(&table.name, column, format!("parent key {pk} overflows"))
                    })?;
                    GeneratedValue::Int(pk)
                }
                None if self.skip_defaulted && column.has_default() => continue,
                None => self.distinct_value(&table.name, column, uniques, rng)?,
            };

            if !column.accepts(&value) {
                return Err(self.invalid(
                    &table.name,
                    column,
                    format!("{} does not fit `{}`", value.display(), column.data_type),
                ));
            }
            columns.push(column.name.as_str());
            values.push(value);
        }

        Ok((columns, values))
    }

    fn distinct_value(
        &self,
        table: &str,
        column: &Column,
        uniques: &mut UniqueValues,
        rng: &mut ChaCha8Rng,
    ) -> Result<GeneratedValue, GenerationError> {
        for _ in 0..MAX_UNIQUE_ATTEMPTS {
            let value = self.values.generate(column, rng);
            if !column.is_unique || value.is_null() || uniques.insert(&column.name, &value) {
                return Ok(value);
            }
        }
        Err(self.invalid(
            table,
            column,
            format!("no distinct value after {MAX_UNIQUE_ATTEMPTS} attempts"),
        ))
    }

    fn invalid(&self, table: &str, column: &Column, reason: String) -> GenerationError {
        GenerationError::InvalidValue {
            run_id: self.run_id.clone(),
            table: table.to_string(),
            column: column.name.clone(),
            reason,
        }
    }
}

/// Values already used by unique columns of the table being generated.
#[derive(Default)]
struct UniqueValues {
    seen: HashMap<String, HashSet<String>>,
}

impl UniqueValues {
    fn insert(&mut self, column: &str, value: &GeneratedValue) -> bool {
        self.seen
            .entry(column.to_string())
            .or_default()
            .insert(value.display())
    }
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use provisioner_core::parse_ddl;
    use provisioner_db::MemoryStore;
    use provisioner_ledger::{LedgerError, MemoryLedger};
    use provisioner_scenario::{parse_scenario, resolve};

    use crate::model::progress_channel;

    const DDL: &str = "
        CREATE TABLE users (
          id INT UNSIGNED AUTO_INCREMENT PRIMARY KEY,
          email VARCHAR(80) NOT NULL UNIQUE,
          score INT NOT NULL,
          tier VARCHAR(10) NOT NULL DEFAULT 'basic'
        );
        CREATE TABLE orders (
          id INT AUTO_INCREMENT PRIMARY KEY,
          user_id INT UNSIGNED NOT NULL,
          total DECIMAL(10,2) NOT NULL,
          FOREIGN KEY (user_id) REFERENCES users (id)
        );";

    const USERS_THEN_ORDERS: &str = r#"{"tables": {
        "users": {"count": 5},
        "orders": {"count": 10, "relations": {"user_id": "users.id"}}
    }}"#;

    struct Harness {
        schema: SchemaModel,
        store: Arc<MemoryStore>,
        ledger: RunLedger,
    }

    impl Harness {
        fn new() -> Self {
            let schema = parse_ddl(DDL).expect("ddl");
            let store = Arc::new(MemoryStore::for_schema(&schema));
            Self {
                schema,
                store,
                ledger: RunLedger::new(Arc::new(MemoryLedger::new())),
            }
        }

        fn engine(&self, options: GenerateOptions) -> GenerationEngine {
            GenerationEngine::new(self.store.clone(), self.ledger.clone(), options)
        }

        async fn run(
            &self,
            scenario: &str,
            options: GenerateOptions,
        ) -> Result<RunSummary, GenerationError> {
            let scenario = parse_scenario(scenario).expect("scenario");
            let resolved = resolve(&scenario, &self.schema).expect("resolve");
            self.engine(options)
                .run(RunKey::new("local", "basic"), &self.schema, &resolved, None)
                .await
        }
    }

    #[tokio::test]
    async fn children_reference_parents_from_the_same_run() {
        let harness = Harness::new();
        let summary = harness
            .run(USERS_THEN_ORDERS, GenerateOptions::default())
            .await
            .expect("generate");

        assert_eq!(summary.rows, 15);
        let users = harness.store.row_ids("users").await;
        assert_eq!(users.len(), 5);
        let orders = harness.store.row_ids("orders").await;
        assert_eq!(orders.len(), 10);
        for order in orders {
            let Some(GeneratedValue::Int(user)) =
                harness.store.value("orders", order, "user_id").await
            else {
                panic!("order {order} has no user_id");
            };
            assert!(users.contains(&(user as u64)));
        }

        let run = harness.ledger.load(&summary.run_id).expect("load");
        assert!(run.metadata.finalized);
        assert_eq!(run.table_order, vec!["users", "orders"]);
        assert_eq!(run.rows_for("users"), &[1, 2, 3, 4, 5]);
        assert_eq!(run.rows_for("orders").len(), 10);
    }

    #[tokio::test]
    async fn empty_parent_fails_before_any_insert() {
        let harness = Harness::new();
        let err = harness
            .run(
                r#"{"tables": {
                    "users": {"count": 0},
                    "orders": {"count": 3, "relations": {"user_id": "users.id"}}
                }}"#,
                GenerateOptions::default(),
            )
            .await
            .expect_err("empty parent");

        assert!(matches!(
            err,
            GenerationError::EmptyParentPool { ref table, ref parent, .. }
                if table == "orders" && parent == "users"
        ));
        assert!(harness.store.row_ids("orders").await.is_empty());
        assert!(harness.ledger.list("local", "basic").expect("list").is_empty());
    }

    #[tokio::test]
    async fn store_failure_reports_last_committed_row() {
        let harness = Harness::new();
        harness.store.fail_inserts_after(3).await;

        let err = harness
            .run(USERS_THEN_ORDERS, GenerateOptions::default())
            .await
            .expect_err("injected failure");
        let GenerationError::Storage { at, .. } = err else {
            panic!("expected storage error, got {err:?}");
        };
        assert_eq!(at.table, "users");
        assert_eq!(at.row, 3);
        assert_eq!(at.last_committed, Some(("users".to_string(), 3)));

        let run = harness.ledger.load(&at.run_id).expect("partial run");
        assert!(!run.metadata.finalized);
        assert_eq!(run.rows_for("users"), &[1, 2, 3]);
        let listed = harness.ledger.list("local", "basic").expect("list");
        assert_eq!(listed.len(), 1);
    }

    #[tokio::test]
    async fn slow_inserts_time_out() {
        let harness = Harness::new();
        harness.store.set_insert_delay(Duration::from_millis(200)).await;

        let options = GenerateOptions {
            statement_timeout: Duration::from_millis(10),
            ..GenerateOptions::default()
        };
        let err = harness
            .run(USERS_THEN_ORDERS, options)
            .await
            .expect_err("timeout");
        assert!(matches!(
            err,
            GenerationError::Timeout { ref at, .. } if at.row == 0 && at.last_committed.is_none()
        ));
    }

    #[tokio::test]
    async fn progress_counts_every_row() {
        let harness = Harness::new();
        let scenario = parse_scenario(USERS_THEN_ORDERS).expect("scenario");
        let resolved = resolve(&scenario, &harness.schema).expect("resolve");
        let (tx, mut rx) = progress_channel();

        harness
            .engine(GenerateOptions::default())
            .run(RunKey::new("local", "basic"), &harness.schema, &resolved, Some(&tx))
            .await
            .expect("generate");
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 15);
        let last = events.last().expect("events");
        assert_eq!((last.done, last.total), (15, 15));
        assert_eq!(last.table, "orders");
        assert_eq!((last.table_done, last.table_total), (10, 10));
    }

    #[tokio::test]
    async fn seed_reproduces_values() {
        let options = GenerateOptions {
            seed: Some(99),
            ..GenerateOptions::default()
        };
        let first = Harness::new();
        let second = Harness::new();
        let left = first.run(USERS_THEN_ORDERS, options.clone()).await.expect("first");
        let right = second.run(USERS_THEN_ORDERS, options).await.expect("second");
        assert_eq!(left.seed, 99);
        assert_eq!(right.seed, 99);

        for pk in 1..=5 {
            assert_eq!(
                first.store.value("users", pk, "email").await,
                second.store.value("users", pk, "email").await
            );
        }
        for pk in 1..=10 {
            assert_eq!(
                first.store.value("orders", pk, "user_id").await,
                second.store.value("orders", pk, "user_id").await
            );
        }
    }

    #[tokio::test]
    async fn defaulted_columns_can_be_left_to_the_database() {
        let harness = Harness::new();
        let options = GenerateOptions {
            skip_defaulted_columns: true,
            ..GenerateOptions::default()
        };
        harness
            .run(r#"{"tables": {"users": {"count": 2}}}"#, options)
            .await
            .expect("generate");

        assert!(harness.store.value("users", 1, "tier").await.is_none());
        assert!(harness.store.value("users", 1, "score").await.is_some());
    }

    #[tokio::test]
    async fn ledger_failure_stops_the_pass() {
        let harness = Harness::new();
        let scenario = parse_scenario(USERS_THEN_ORDERS).expect("scenario");
        let resolved = resolve(&scenario, &harness.schema).expect("resolve");
        let engine = GenerationEngine::new(
            harness.store.clone(),
            RunLedger::new(Arc::new(FailingLedger)),
            GenerateOptions::default(),
        );

        let err = engine
            .run(RunKey::new("local", "basic"), &harness.schema, &resolved, None)
            .await
            .expect_err("ledger failure");
        assert!(matches!(err, GenerationError::Ledger(LedgerError::Poisoned)));
        assert!(harness.store.row_ids("users").await.is_empty());
    }

    struct FailingLedger;

    impl provisioner_ledger::LedgerBackend for FailingLedger {
        fn create(&self, _key: &RunKey, _run_id: &RunId) -> provisioner_ledger::LedgerResult<()> {
            Err(LedgerError::Poisoned)
        }

        fn append(
            &self,
            _run_id: &RunId,
            _record: &provisioner_ledger::LedgerRecord,
        ) -> provisioner_ledger::LedgerResult<()> {
            Err(LedgerError::Poisoned)
        }

        fn read_all(
            &self,
            run_id: &RunId,
        ) -> provisioner_ledger::LedgerResult<Vec<provisioner_ledger::LedgerRecord>> {
            Err(LedgerError::RunNotFound(run_id.to_string()))
        }

        fn list(&self, _key: &RunKey) -> provisioner_ledger::LedgerResult<Vec<RunId>> {
            Ok(Vec::new())
        }

        fn retire(&self, _run_id: &RunId) -> provisioner_ledger::LedgerResult<()> {
            Err(LedgerError::Poisoned)
        }

        fn is_retired(&self, _run_id: &RunId) -> provisioner_ledger::LedgerResult<bool> {
            Ok(false)
        }
    }
}
