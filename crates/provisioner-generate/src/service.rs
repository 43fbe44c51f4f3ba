use std::sync::Arc;

use tracing::info;

use provisioner_core::SchemaModel;
use provisioner_db::RowStore;
use provisioner_ledger::{LeaseProvider, RunId, RunKey, RunLedger, RunMetadata};
use provisioner_scenario::{Scenario, resolve};

use crate::engine::{GenerationEngine, check_parent_pools};
use crate::errors::ProvisionError;
use crate::model::{GenerateOptions, ProgressSender, RollbackSummary, RunSummary, ValidationOutcome};
use crate::rollback::RollbackEngine;

/// Everything a pass needs to know about one scenario of one profile.
#[derive(Debug, Clone)]
pub struct ScenarioInput {
    pub profile: String,
    pub scenario_name: String,
    pub schema: SchemaModel,
    pub scenario: Scenario,
}

/// Operations a front end can ask for.
#[derive(Debug)]
pub enum Request {
    Validate(ScenarioInput),
    Generate {
        input: ScenarioInput,
        progress: Option<ProgressSender>,
    },
    Rollback {
        run_id: RunId,
        schema: SchemaModel,
        forget_missing: bool,
    },
    ListRuns {
        profile: String,
        scenario: String,
    },
}

#[derive(Debug)]
pub enum Response {
    Validated(ValidationOutcome),
    Generated(RunSummary),
    RolledBack(RollbackSummary),
    Runs(Vec<RunMetadata>),
}

/// Entry point tying the store, the ledger and the lease together.
pub struct Provisioner {
    store: Arc<dyn RowStore>,
    ledger: RunLedger,
    lease: Arc<dyn LeaseProvider>,
    options: GenerateOptions,
}

impl Provisioner {
    pub fn new(
        store: Arc<dyn RowStore>,
        ledger: RunLedger,
        lease: Arc<dyn LeaseProvider>,
        options: GenerateOptions,
    ) -> Self {
        Self {
            store,
            ledger,
            lease,
            options,
        }
    }

    pub fn ledger(&self) -> &RunLedger {
        &self.ledger
    }

    /// Resolve the scenario against the schema and run the static checks.
    /// Nothing touches the store.
    pub fn validate(&self, input: &ScenarioInput) -> Result<ValidationOutcome, ProvisionError> {
        let resolved = resolve(&input.scenario, &input.schema)?;
        check_parent_pools(&resolved)?;
        Ok(ValidationOutcome {
            profile: input.profile.clone(),
            scenario: input.scenario_name.clone(),
            schema_fingerprint: input.schema.fingerprint(),
            table_order: resolved.table_order(),
            total_rows: resolved.total_rows(),
            warnings: resolved.warnings,
        })
    }

    pub async fn generate(
        &self,
        input: &ScenarioInput,
        progress: Option<ProgressSender>,
    ) -> Result<RunSummary, ProvisionError> {
        let resolved = resolve(&input.scenario, &input.schema)?;
        check_parent_pools(&resolved)?;
        for warning in &resolved.warnings {
            tracing::warn!(
                event = "scenario_warning",
                code = %warning.code,
                path = %warning.path,
                "{}",
                warning.message
            );
        }

        let _lease = self.lease.acquire()?;
        let engine = GenerationEngine::new(
            Arc::clone(&self.store),
            self.ledger.clone(),
            self.options.clone(),
        );
        let summary = engine
            .run(
                RunKey::new(&input.profile, &input.scenario_name),
                &input.schema,
                &resolved,
                progress.as_ref(),
            )
            .await?;
        Ok(summary)
    }

    pub async fn rollback(
        &self,
        run_id: &RunId,
        schema: &SchemaModel,
    ) -> Result<RollbackSummary, ProvisionError> {
        self.rollback_with(run_id, schema, false).await
    }

    /// Rollback that can also record rows already missing from the store as
    /// deleted, so a run stuck on them can retire.
    pub async fn rollback_with(
        &self,
        run_id: &RunId,
        schema: &SchemaModel,
        forget_missing: bool,
    ) -> Result<RollbackSummary, ProvisionError> {
        let _lease = self.lease.acquire()?;
        let run = self.ledger.load(run_id)?;
        let engine = RollbackEngine::new(
            Arc::clone(&self.store),
            self.ledger.clone(),
            self.options.statement_timeout,
        )
        .forget_missing(forget_missing);
        Ok(engine.run(&run, schema).await?)
    }

    pub fn list_runs(
        &self,
        profile: &str,
        scenario: &str,
    ) -> Result<Vec<RunMetadata>, ProvisionError> {
        Ok(self.ledger.list(profile, scenario)?)
    }

    pub async fn dispatch(&self, request: Request) -> Result<Response, ProvisionError> {
        let response = match request {
            Request::Validate(input) => Response::Validated(self.validate(&input)?),
            Request::Generate { input, progress } => {
                Response::Generated(self.generate(&input, progress).await?)
            }
            Request::Rollback {
                run_id,
                schema,
                forget_missing,
            } => Response::RolledBack(
                self.rollback_with(&run_id, &schema, forget_missing)
                    .await?,
            ),
            Request::ListRuns { profile, scenario } => {
                Response::Runs(self.list_runs(&profile, &scenario)?)
            }
        };
        info!(event = "request_handled", response = response.kind(), "request handled");
        Ok(response)
    }
}

impl Response {
    fn kind(&self) -> &'static str {
        match self {
            Response::Validated(_) => "validated",
            Response::Generated(_) => "generated",
            Response::RolledBack(_) => "rolled_back",
            Response::Runs(_) => "runs",
        }
    }
}
