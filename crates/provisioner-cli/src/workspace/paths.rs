use std::path::{Path, PathBuf};

use provisioner_ledger::FileLease;

use super::{WorkspaceError, WorkspaceResult};

/// Directory layout of a provisioner workspace.
///
/// ```text
/// provisioner.toml
/// config/<profile>/{connection.toml,schema.sql}
/// scenario/<profile>/<name>.json
/// work/<profile>__<scenario>/run_<id>.ndjson
/// work/logs/provisioner.ndjson
/// dump/
/// ```
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    pub root: PathBuf,
    pub config_dir: PathBuf,
    pub scenario_dir: PathBuf,
    pub work_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub dump_dir: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: PathBuf) -> Self {
        let config_dir = root.join("config");
        let scenario_dir = root.join("scenario");
        let work_dir = root.join("work");
        let logs_dir = work_dir.join("logs");
        let dump_dir = root.join("dump");
        Self {
            root,
            config_dir,
            scenario_dir,
            work_dir,
            logs_dir,
            dump_dir,
        }
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join("provisioner.toml")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(FileLease::FILE_NAME)
    }

    pub fn log_path(&self) -> PathBuf {
        self.logs_dir.join("provisioner.ndjson")
    }

    pub fn profile_dir(&self, profile: &str) -> PathBuf {
        self.config_dir.join(profile)
    }

    pub fn connection_path(&self, profile: &str) -> PathBuf {
        self.profile_dir(profile).join("connection.toml")
    }

    pub fn schema_path(&self, profile: &str) -> PathBuf {
        self.profile_dir(profile).join("schema.sql")
    }

    pub fn scenario_path(&self, profile: &str, scenario: &str) -> PathBuf {
        self.scenario_dir
            .join(profile)
            .join(format!("{scenario}.json"))
    }

    pub fn ensure_dirs(&self) -> WorkspaceResult<()> {
        create_if_missing(&self.root)?;
        create_if_missing(&self.work_dir)?;
        create_if_missing(&self.logs_dir)?;
        Ok(())
    }
}

fn create_if_missing(path: &Path) -> WorkspaceResult<()> {
    if path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(path).map_err(WorkspaceError::from)
}
