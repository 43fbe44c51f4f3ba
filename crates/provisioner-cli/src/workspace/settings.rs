use std::time::Duration;

use serde::{Deserialize, Serialize};

use provisioner_generate::{GenerateOptions, MAX_DATETIME_WINDOW_DAYS};

use super::atomic::write_bytes_atomic;
use super::{WorkspaceError, WorkspacePaths, WorkspaceResult};

/// How passes are kept from overlapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaseKind {
    /// Lock file in the workspace root; excludes other processes.
    File,
    /// In-process flag only.
    Process,
}

/// Workspace-wide generation settings (`provisioner.toml`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionerSettings {
    pub null_probability: f64,
    pub datetime_window_days: u32,
    pub statement_timeout_secs: u64,
    pub skip_defaulted_columns: bool,
    pub lease: LeaseKind,
}

impl Default for ProvisionerSettings {
    fn default() -> Self {
        let options = GenerateOptions::default();
        Self {
            null_probability: options.null_probability,
            datetime_window_days: options.datetime_window_days,
            statement_timeout_secs: options.statement_timeout.as_secs(),
            skip_defaulted_columns: options.skip_defaulted_columns,
            lease: LeaseKind::File,
        }
    }
}

impl ProvisionerSettings {
    pub fn validate(&self) -> WorkspaceResult<()> {
        if self.datetime_window_days > MAX_DATETIME_WINDOW_DAYS {
            return Err(WorkspaceError::Invalid(format!(
                "datetime_window_days must be at most {MAX_DATETIME_WINDOW_DAYS}, got {}",
                self.datetime_window_days
            )));
        }
        if !(0.0..=1.0).contains(&self.null_probability) {
            return Err(WorkspaceError::Invalid(format!(
                "null_probability must be within [0, 1], got {}",
                self.null_probability
            )));
        }
        Ok(())
    }

    pub fn generate_options(&self, seed: Option<u64>) -> GenerateOptions {
        GenerateOptions {
            null_probability: self.null_probability,
            datetime_window_days: self.datetime_window_days,
            statement_timeout: Duration::from_secs(self.statement_timeout_secs.max(1)),
            skip_defaulted_columns: self.skip_defaulted_columns,
            seed,
        }
    }
}

pub fn load_or_create_settings(paths: &WorkspacePaths) -> WorkspaceResult<ProvisionerSettings> {
    let path = paths.settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        let settings: ProvisionerSettings =
            toml::from_str(&content).map_err(|source| WorkspaceError::TomlDecode {
                path: path.display().to_string(),
                source,
            })?;
        settings.validate()?;
        return Ok(settings);
    }

    let settings = ProvisionerSettings::default();
    save_settings(paths, &settings)?;
    Ok(settings)
}

pub fn save_settings(paths: &WorkspacePaths, settings: &ProvisionerSettings) -> WorkspaceResult<()> {
    let encoded = toml::to_string_pretty(settings)?;
    write_bytes_atomic(&paths.settings_path(), encoded.as_bytes())
}
