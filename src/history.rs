//! Durable record of verified downloads, keyed by DOI.
//!
//! The history file (`.history.json` under the output root) is what makes
//! repeated runs idempotent: a DOI whose record points at a file that still
//! exists is never fetched again.
//!
//! The file is read once, lazily, on first access. Every write takes the same
//! lock, updates the in-memory map, and rewrites the whole file. Write
//! failures are logged and swallowed; the in-memory record stays valid for
//! the rest of the process.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::parser::Doi;

/// File name of the history file inside the output root.
pub const HISTORY_FILE_NAME: &str = ".history.json";

/// One verified download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Authoritative title the file was verified against.
    pub title: String,
    /// Where the document was stored.
    pub path: PathBuf,
    /// Crawl subdirectory (`main`, `ref1`, `cited`, ...).
    pub subdir: String,
    /// References known when the record was written.
    #[serde(deserialize_with = "valid_dois")]
    pub references: Vec<Doi>,
    /// When the record was written (UTC).
    pub ts: DateTime<Utc>,
}

impl HistoryRecord {
    /// Returns true if the stored file is still on disk.
    #[must_use]
    pub fn file_exists(&self) -> bool {
        self.path.is_file()
    }
}

type HistoryMap = BTreeMap<Doi, HistoryRecord>;

/// Reads a reference list, dropping entries that do not normalize to a DOI.
fn valid_dois<'de, D>(deserializer: D) -> Result<Vec<Doi>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<String>::deserialize(deserializer)?;
    Ok(raw.iter().filter_map(|r| Doi::parse(r)).collect())
}

/// Lazily loaded, lock-guarded history file.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    records: Mutex<Option<HistoryMap>>,
}

impl HistoryStore {
    /// Creates a store backed by `path`. Nothing is read until first use.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Mutex::new(None),
        }
    }

    /// Creates a store at `{output_root}/.history.json`.
    #[must_use]
    pub fn in_output_root(output_root: &Path) -> Self {
        Self::new(output_root.join(HISTORY_FILE_NAME))
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the record for `doi`, if any.
    pub async fn get(&self, doi: &Doi) -> Option<HistoryRecord> {
        let mut guard = self.records.lock().await;
        let records = guard.get_or_insert_with(|| load(&self.path));
        records.get(doi).cloned()
    }

    /// Inserts or replaces the record for `doi` and rewrites the file.
    #[instrument(skip(self, record), fields(doi = %doi, path = %record.path.display()))]
    pub async fn put(&self, doi: &Doi, record: HistoryRecord) {
        let mut guard = self.records.lock().await;
        let records = guard.get_or_insert_with(|| load(&self.path));
        records.insert(doi.clone(), record);

        if let Err(e) = persist(&self.path, records).await {
            warn!(
                file = %self.path.display(),
                error = %e,
                "history write failed; record kept in memory only"
            );
        }
    }

    /// Returns the DOI whose record points at `path`, if any.
    pub async fn holder_of(&self, path: &Path) -> Option<Doi> {
        let mut guard = self.records.lock().await;
        let records = guard.get_or_insert_with(|| load(&self.path));
        records
            .iter()
            .find(|(_, record)| record.path == path)
            .map(|(doi, _)| doi.clone())
    }

    /// Number of records.
    pub async fn len(&self) -> usize {
        let mut guard = self.records.lock().await;
        guard.get_or_insert_with(|| load(&self.path)).len()
    }

    /// Returns true when there are no records.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Reads the history file; a missing or unreadable file yields an empty map.
fn load(path: &Path) -> HistoryMap {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(file = %path.display(), "no history file yet");
            return HistoryMap::new();
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "history file unreadable; starting empty");
            return HistoryMap::new();
        }
    };

    // Entries are decoded one by one so a single bad key or record does not
    // discard the rest of the file.
    match serde_json::from_slice::<BTreeMap<String, serde_json::Value>>(&bytes) {
        Ok(raw) => {
            let mut records = HistoryMap::new();
            let mut skipped = 0usize;
            for (key, value) in raw {
                match (Doi::parse(&key), serde_json::from_value::<HistoryRecord>(value)) {
                    (Some(doi), Ok(record)) => {
                        records.insert(doi, record);
                    }
                    (_, result) => {
                        skipped += 1;
                        debug!(key = %key, error = ?result.err(), "skipping history entry");
                    }
                }
            }
            if skipped > 0 {
                warn!(file = %path.display(), skipped, "ignored malformed history entries");
            }
            debug!(file = %path.display(), records = records.len(), "history loaded");
            records
        }
        Err(e) => {
            warn!(file = %path.display(), error = %e, "history file corrupt; starting empty");
            HistoryMap::new()
        }
    }
}

/// Serializes the full map and replaces the file via a sibling temp file.
async fn persist(path: &Path, records: &HistoryMap) -> Result<(), std::io::Error> {
    let json = serde_json::to_vec_pretty(records)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    tokio::fs::write(&tmp, &json).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    debug!(file = %path.display(), records = records.len(), "history persisted");
    Ok(())
}
