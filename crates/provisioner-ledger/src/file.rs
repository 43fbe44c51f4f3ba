use std::collections::HashMap;
use std::fs::{self, File, OpenOptions, create_dir_all};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use crate::backend::LedgerBackend;
use crate::error::{LedgerError, LedgerResult};
use crate::id::RunId;
use crate::record::{LedgerRecord, RunKey};

const LEDGER_EXT: &str = "ndjson";
const TOMBSTONE_EXT: &str = "done";

/// NDJSON ledger files under a work directory.
///
/// Layout: `<root>/<profile>__<scenario>/run_<id>.ndjson`, one record per
/// line. Retiring a run writes a `run_<id>.done` tombstone next to it.
#[derive(Debug)]
pub struct FileLedger {
    root: PathBuf,
    located: Mutex<HashMap<RunId, PathBuf>>,
}

impl FileLedger {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            located: Mutex::new(HashMap::new()),
        }
    }

    pub fn run_dir(&self, key: &RunKey) -> PathBuf {
        self.root
            .join(format!("{}__{}", key.profile, key.scenario))
    }

    /// Path of the ledger file for `run_id`, searching every run directory
    /// on first use.
    pub fn ledger_path(&self, run_id: &RunId) -> LedgerResult<PathBuf> {
        let mut located = self.located.lock().map_err(|_| LedgerError::Poisoned)?;
        if let Some(path) = located.get(run_id) {
            return Ok(path.clone());
        }

        let file_name = ledger_file_name(run_id);
        if self.root.is_dir() {
            for entry in fs::read_dir(&self.root)? {
                let candidate = entry?.path().join(&file_name);
                if candidate.is_file() {
                    located.insert(run_id.clone(), candidate.clone());
                    return Ok(candidate);
                }
            }
        }
        Err(LedgerError::RunNotFound(run_id.to_string()))
    }

    fn remember(&self, run_id: &RunId, path: PathBuf) -> LedgerResult<()> {
        let mut located = self.located.lock().map_err(|_| LedgerError::Poisoned)?;
        located.insert(run_id.clone(), path);
        Ok(())
    }
}

impl LedgerBackend for FileLedger {
    fn create(&self, key: &RunKey, run_id: &RunId) -> LedgerResult<()> {
        let dir = self.run_dir(key);
        create_dir_all(&dir)?;

        let path = dir.join(ledger_file_name(run_id));
        if path.with_extension(TOMBSTONE_EXT).exists() {
            return Err(LedgerError::RunExists(run_id.to_string()));
        }
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file.sync_all()?,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                return Err(LedgerError::RunExists(run_id.to_string()));
            }
            Err(err) => return Err(err.into()),
        }
        sync_dir(&dir)?;
        self.remember(run_id, path)
    }

    fn append(&self, run_id: &RunId, record: &LedgerRecord) -> LedgerResult<()> {
        let path = self.ledger_path(run_id)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
        drop_torn_tail(&mut file)?;
        file.seek(SeekFrom::End(0))?;
        file.write_all(&line)?;
        file.sync_data()?;
        Ok(())
    }

    fn read_all(&self, run_id: &RunId) -> LedgerResult<Vec<LedgerRecord>> {
        let path = self.ledger_path(run_id)?;
        let contents = fs::read_to_string(&path)?;
        parse_records(run_id, &contents)
    }

    fn list(&self, key: &RunKey) -> LedgerResult<Vec<RunId>> {
        let dir = self.run_dir(key);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(LEDGER_EXT) {
                continue;
            }
            let Some(run_id) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| stem.strip_prefix("run_"))
                .and_then(|raw| RunId::parse(raw).ok())
            else {
                continue;
            };
            if path.with_extension(TOMBSTONE_EXT).exists() {
                continue;
            }
            self.remember(&run_id, path)?;
            runs.push(run_id);
        }
        Ok(runs)
    }

    fn retire(&self, run_id: &RunId) -> LedgerResult<()> {
        let path = self.ledger_path(run_id)?;
        let tombstone = path.with_extension(TOMBSTONE_EXT);
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tombstone)?;
        writeln!(file, "{}", Utc::now().to_rfc3339())?;
        file.sync_all()?;
        if let Some(parent) = tombstone.parent() {
            sync_dir(parent)?;
        }
        Ok(())
    }

    fn is_retired(&self, run_id: &RunId) -> LedgerResult<bool> {
        let path = self.ledger_path(run_id)?;
        Ok(path.with_extension(TOMBSTONE_EXT).exists())
    }
}

fn ledger_file_name(run_id: &RunId) -> String {
    format!("run_{run_id}.{LEDGER_EXT}")
}

/// Parse NDJSON records. A final line without its newline is a write cut
/// short by a crash and is skipped; any other bad line is corruption.
fn parse_records(run_id: &RunId, contents: &str) -> LedgerResult<Vec<LedgerRecord>> {
    let complete = match contents.rfind('\n') {
        Some(idx) => &contents[..=idx],
        None => "",
    };
    if complete.len() < contents.len() {
        tracing::warn!(
            event = "ledger_torn_tail",
            run_id = %run_id,
            bytes = contents.len() - complete.len(),
            "ignoring incomplete trailing ledger line"
        );
    }

    let mut records = Vec::new();
    for (idx, line) in complete.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record =
            serde_json::from_str::<LedgerRecord>(line).map_err(|err| LedgerError::Corrupt {
                run_id: run_id.to_string(),
                line: idx + 1,
                reason: err.to_string(),
            })?;
        records.push(record);
    }
    Ok(records)
}

/// Cut an incomplete trailing line so the next append starts a fresh line.
fn drop_torn_tail(file: &mut File) -> io::Result<()> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(());
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(());
    }

    let mut contents = Vec::with_capacity(len as usize);
    file.seek(SeekFrom::Start(0))?;
    file.read_to_end(&mut contents)?;
    let keep = contents
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map(|idx| idx as u64 + 1)
        .unwrap_or(0);
    file.set_len(keep)?;
    file.sync_data()
}

fn sync_dir(path: &Path) -> io::Result<()> {
    let dir = OpenOptions::new().read(true).open(path)?;
    dir.sync_all()
}
