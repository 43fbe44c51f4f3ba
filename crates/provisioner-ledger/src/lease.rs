use std::fs::{self, OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{LedgerError, LedgerResult};

/// Grants exclusive access for one generation or rollback pass.
pub trait LeaseProvider: Send + Sync {
    fn acquire(&self) -> LedgerResult<LeaseGuard>;
}

/// Held lease; released on drop.
pub struct LeaseGuard {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl LeaseGuard {
    fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for LeaseGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for LeaseGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaseGuard")
            .field("held", &self.release.is_some())
            .finish()
    }
}

/// Lock file holding the owner's pid, created exclusively.
///
/// A crashed process leaves the file behind; it has to be removed by hand.
#[derive(Debug, Clone)]
pub struct FileLease {
    path: PathBuf,
}

impl FileLease {
    pub const FILE_NAME: &'static str = ".provisioner.lock";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl LeaseProvider for FileLease {
    fn acquire(&self) -> LedgerResult<LeaseGuard> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_all(parent)?;
            }
        }

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                let holder = fs::read_to_string(&self.path)
                    .map(|pid| format!("pid {}", pid.trim()))
                    .unwrap_or_else(|_| "unknown holder".to_string());
                return Err(LedgerError::LeaseUnavailable(format!(
                    "{holder}, lock file {}",
                    self.path.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };
        writeln!(file, "{}", std::process::id())?;
        file.sync_all()?;

        let path = self.path.clone();
        Ok(LeaseGuard::new(move || {
            if let Err(err) = fs::remove_file(&path) {
                tracing::warn!(
                    event = "lease_release_failed",
                    path = %path.display(),
                    error = %err,
                    "failed to remove lock file"
                );
            }
        }))
    }
}

/// Process-local lease for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct ProcessLease {
    held: Arc<AtomicBool>,
}

impl ProcessLease {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LeaseProvider for ProcessLease {
    fn acquire(&self) -> LedgerResult<LeaseGuard> {
        if self
            .held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(LedgerError::LeaseUnavailable(
                "held by this process".to_string(),
            ));
        }
        let held = Arc::clone(&self.held);
        Ok(LeaseGuard::new(move || held.store(false, Ordering::Release)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_lease_is_exclusive_until_dropped() {
        let lease = ProcessLease::new();
        let guard = lease.acquire().expect("first acquire");
        assert!(matches!(
            lease.acquire(),
            Err(LedgerError::LeaseUnavailable(_))
        ));
        drop(guard);
        lease.acquire().expect("acquire after release");
    }
}
