use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use provisioner_db::ConnectionOptions;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("mysqldump exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
}

/// Arguments for `mysqldump`; the password goes through `MYSQL_PWD`, never
/// the command line.
pub fn dump_args(options: &ConnectionOptions, tables: &[String]) -> Vec<String> {
    let mut args = vec![
        "-h".to_string(),
        options.tcp_host().to_string(),
        "-P".to_string(),
        options.port.to_string(),
        "-u".to_string(),
        options.user.clone(),
        "--protocol=TCP".to_string(),
        options.database.clone(),
    ];
    args.extend(tables.iter().cloned());
    args
}

/// Default dump file name: `<profile>_<UTC timestamp>.sql`.
pub fn default_file_name(profile: &str) -> String {
    format!("{profile}_{}.sql", chrono::Utc::now().format("%Y%m%d%H%M%S"))
}

/// Run `mysqldump` into `dump_dir/file_name` and return the written path.
pub fn run_dump(
    options: &ConnectionOptions,
    tables: &[String],
    dump_dir: &Path,
    file_name: &str,
) -> Result<PathBuf, DumpError> {
    std::fs::create_dir_all(dump_dir)?;
    let output_path = dump_dir.join(file_name);
    let output = File::create(&output_path)?;

    let mut command = Command::new("mysqldump");
    command
        .args(dump_args(options, tables))
        .stdout(Stdio::from(output))
        .stderr(Stdio::piped());
    if let Some(password) = &options.password {
        command.env("MYSQL_PWD", password);
    }

    tracing::info!(
        event = "dump_started",
        target = %options.display_url(),
        tables = tables.len(),
        path = %output_path.display(),
        "running mysqldump"
    );
    let result = command.output()?;
    if !result.status.success() {
        return Err(DumpError::Failed {
            status: result.status.to_string(),
            stderr: String::from_utf8_lossy(&result.stderr).trim().to_string(),
        });
    }
    tracing::info!(event = "dump_finished", path = %output_path.display(), "dump written");
    Ok(output_path)
}
