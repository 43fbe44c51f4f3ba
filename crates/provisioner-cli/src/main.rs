mod dump;
mod logging;
mod workspace;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use provisioner_core::{SchemaModel, SchemaParseError, parse_ddl};
use provisioner_db::{DbError, MemoryStore, MySqlStore, RowStore};
use provisioner_generate::{
    ProvisionError, Provisioner, RollbackError, ScenarioInput, progress_channel,
};
use provisioner_ledger::{
    FileLease, FileLedger, LeaseProvider, LedgerBackend, LedgerError, MemoryLedger, ProcessLease,
    RunId, RunLedger,
};
use provisioner_scenario::{ScenarioError, load_scenario, scenario_json_schema};
use thiserror::Error;

use dump::{DumpError, default_file_name, run_dump};
use workspace::{
    LeaseKind, ProvisionerSettings, WorkspaceError, WorkspacePaths, list_profiles,
    list_scenarios, load_connection, load_or_create_settings,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Schema(#[from] SchemaParseError),
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),
    #[error("database error: {0}")]
    Database(#[from] DbError),
    #[error("ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error("dump error: {0}")]
    Dump(#[from] DumpError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),
}

#[derive(Parser, Debug)]
#[command(
    name = "provisioner",
    version,
    about = "Seed MySQL with scenario-driven test data and roll it back"
)]
struct Cli {
    /// Workspace root holding config/, scenario/ and work/.
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List profiles with a connection file and a schema.
    Profiles,
    /// List scenarios of a profile.
    Scenarios(ProfileArgs),
    /// Check a scenario against the profile schema without connecting.
    Validate(ScenarioArgs),
    /// Insert the rows a scenario describes.
    Generate(GenerateArgs),
    /// List runs of a scenario, newest first.
    Runs(ScenarioArgs),
    /// Delete the rows a run inserted.
    Rollback(RollbackArgs),
    /// Dump the profile database with mysqldump.
    Dump(DumpArgs),
    /// Print the JSON Schema of scenario files.
    ScenarioSchema,
}

#[derive(Args, Debug)]
struct ProfileArgs {
    #[arg(long)]
    profile: String,
}

#[derive(Args, Debug)]
struct ScenarioArgs {
    #[arg(long)]
    profile: String,
    /// Scenario name (file stem under scenario/<profile>/).
    #[arg(long)]
    scenario: String,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    target: ScenarioArgs,
    /// Seed for reproducible values.
    #[arg(long)]
    seed: Option<u64>,
    /// Generate against an in-memory store; nothing is written to MySQL or
    /// the work directory.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Args, Debug)]
struct RollbackArgs {
    #[arg(long)]
    profile: String,
    /// Needed with --latest.
    #[arg(long)]
    scenario: Option<String>,
    #[arg(long, conflicts_with = "latest", required_unless_present = "latest")]
    run_id: Option<String>,
    /// Roll back the newest run of --scenario.
    #[arg(long, default_value_t = false)]
    latest: bool,
    /// Record rows already missing from the database as deleted.
    #[arg(long, default_value_t = false)]
    forget_missing: bool,
}

#[derive(Args, Debug)]
struct DumpArgs {
    #[arg(long)]
    profile: String,
    /// Only these tables.
    #[arg(long, num_args = 1..)]
    tables: Vec<String>,
    /// File name under dump/.
    #[arg(long)]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let paths = WorkspacePaths::new(cli.workspace);
    paths.ensure_dirs()?;
    logging::init_logging(&paths.log_path())?;
    let settings = load_or_create_settings(&paths)?;

    tracing::info!(
        event = "command_started",
        workspace = %paths.root.display(),
        "provisioner started"
    );

    match cli.command {
        Command::Profiles => {
            for profile in list_profiles(&paths)? {
                println!("{profile}");
            }
            Ok(())
        }
        Command::Scenarios(args) => {
            for scenario in list_scenarios(&paths, &args.profile)? {
                println!("{scenario}");
            }
            Ok(())
        }
        Command::Validate(args) => run_validate(&paths, &settings, args),
        Command::Generate(args) => run_generate(&paths, &settings, args).await,
        Command::Runs(args) => run_list(&paths, args),
        Command::Rollback(args) => run_rollback(&paths, &settings, args).await,
        Command::Dump(args) => {
            let options = load_connection(&paths, &args.profile)?;
            let file_name = args
                .output
                .unwrap_or_else(|| default_file_name(&args.profile));
            let path = run_dump(&options, &args.tables, &paths.dump_dir, &file_name)?;
            println!("{}", path.display());
            Ok(())
        }
        Command::ScenarioSchema => {
            println!("{}", serde_json::to_string_pretty(&scenario_json_schema())?);
            Ok(())
        }
    }
}

fn run_validate(
    paths: &WorkspacePaths,
    settings: &ProvisionerSettings,
    args: ScenarioArgs,
) -> Result<(), CliError> {
    let input = load_input(paths, &args)?;
    // validation never reaches the store
    let provisioner = Provisioner::new(
        Arc::new(MemoryStore::new()),
        RunLedger::new(Arc::new(MemoryLedger::new())),
        Arc::new(ProcessLease::new()),
        settings.generate_options(None),
    );
    let outcome = provisioner.validate(&input)?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

async fn run_generate(
    paths: &WorkspacePaths,
    settings: &ProvisionerSettings,
    args: GenerateArgs,
) -> Result<(), CliError> {
    let input = load_input(paths, &args.target)?;

    let (store, backend, lease): (Arc<dyn RowStore>, Arc<dyn LedgerBackend>, Arc<dyn LeaseProvider>) =
        if args.dry_run {
            (
                Arc::new(MemoryStore::for_schema(&input.schema)),
                Arc::new(MemoryLedger::new()),
                Arc::new(ProcessLease::new()),
            )
        } else {
            let options = load_connection(paths, &input.profile)?;
            (
                Arc::new(MySqlStore::connect(&options).await?),
                Arc::new(FileLedger::new(&paths.work_dir)),
                lease_for(paths, settings),
            )
        };
    let provisioner = Provisioner::new(
        store,
        RunLedger::new(backend),
        lease,
        settings.generate_options(args.seed),
    );

    let (tx, mut rx) = progress_channel();
    let reporter = tokio::spawn(async move {
        while let Some(progress) = rx.recv().await {
            eprint!(
                "\r[{}] {}/{}  total {}/{}",
                progress.table, progress.table_done, progress.table_total, progress.done,
                progress.total
            );
        }
        eprintln!();
    });

    let outcome = provisioner.generate(&input, Some(tx)).await;
    // the sender is gone once generate returns, so the reporter drains and ends
    let _ = reporter.await;

    let summary = outcome?;
    if args.dry_run {
        tracing::info!(event = "dry_run_finished", rows = summary.rows, "dry run finished");
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn run_list(paths: &WorkspacePaths, args: ScenarioArgs) -> Result<(), CliError> {
    let ledger = RunLedger::new(Arc::new(FileLedger::new(&paths.work_dir)));
    for run in ledger.list(&args.profile, &args.scenario)? {
        println!(
            "{}  {}  {:<9}  inserted {:>6}  remaining {:>6}",
            run.run_id,
            run.created_at.to_rfc3339(),
            if run.finalized { "complete" } else { "partial" },
            run.inserted,
            run.remaining
        );
    }
    Ok(())
}

async fn run_rollback(
    paths: &WorkspacePaths,
    settings: &ProvisionerSettings,
    args: RollbackArgs,
) -> Result<(), CliError> {
    let ledger = RunLedger::new(Arc::new(FileLedger::new(&paths.work_dir)));
    let run_id = match (&args.run_id, args.latest, &args.scenario) {
        (Some(raw), _, _) => RunId::parse(raw)?,
        (None, true, Some(scenario)) => ledger
            .list(&args.profile, scenario)?
            .into_iter()
            .next()
            .map(|run| run.run_id)
            .ok_or_else(|| {
                CliError::InvalidArgs(format!(
                    "no runs to roll back for `{}` / `{scenario}`",
                    args.profile
                ))
            })?,
        (None, true, None) => {
            return Err(CliError::InvalidArgs(
                "--latest needs --scenario".to_string(),
            ));
        }
        (None, false, _) => {
            return Err(CliError::InvalidArgs(
                "pass --run-id or --latest".to_string(),
            ));
        }
    };

    let schema = load_schema(paths, &args.profile)?;
    let options = load_connection(paths, &args.profile)?;
    let provisioner = Provisioner::new(
        Arc::new(MySqlStore::connect(&options).await?),
        ledger,
        lease_for(paths, settings),
        settings.generate_options(None),
    );

    match provisioner
        .rollback_with(&run_id, &schema, args.forget_missing)
        .await
    {
        Ok(summary) => {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(ProvisionError::Rollback(RollbackError::Partial(report))) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Err(ProvisionError::Rollback(RollbackError::Partial(report)).into())
        }
        Err(err) => Err(err.into()),
    }
}

fn lease_for(paths: &WorkspacePaths, settings: &ProvisionerSettings) -> Arc<dyn LeaseProvider> {
    match settings.lease {
        LeaseKind::File => Arc::new(FileLease::new(paths.lock_path())),
        LeaseKind::Process => Arc::new(ProcessLease::new()),
    }
}

fn load_schema(paths: &WorkspacePaths, profile: &str) -> Result<SchemaModel, CliError> {
    let path = paths.schema_path(profile);
    let sql = std::fs::read_to_string(&path).map_err(|err| {
        CliError::InvalidArgs(format!("cannot read {}: {err}", path.display()))
    })?;
    Ok(parse_ddl(&sql)?)
}

fn load_input(paths: &WorkspacePaths, args: &ScenarioArgs) -> Result<ScenarioInput, CliError> {
    let schema = load_schema(paths, &args.profile)?;
    let scenario = load_scenario(&paths.scenario_path(&args.profile, &args.scenario))?;
    Ok(ScenarioInput {
        profile: args.profile.clone(),
        scenario_name: args.scenario.clone(),
        schema,
        scenario,
    })
}
