mod atomic;
mod paths;
mod profiles;
mod settings;

pub use atomic::write_bytes_atomic;
pub use paths::WorkspacePaths;
pub use profiles::{ConnectionConfig, list_profiles, list_scenarios, load_connection};
pub use settings::{LeaseKind, ProvisionerSettings, load_or_create_settings, save_settings};

use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("toml decode error in {path}: {source}")]
    TomlDecode {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("toml encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("invalid workspace state: {0}")]
    Invalid(String),
}

pub type WorkspaceResult<T> = Result<T, WorkspaceError>;
