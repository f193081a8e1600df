//! Session context
//!
//! Session-scoped string key/value store holding the last prediction, the
//! uploaded file name and the raw CSV text. The upload orchestrator is the
//! only writer and always writes the full bundle in a single step; the
//! dashboard and report generator only read.
//!
//! A context is either purely in-memory or backed by a JSON file so that
//! separate CLI invocations of the same login session can share it.

use crate::{Error, PredictionResult, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::{debug, warn};

pub const KEY_PREDICTION_RESULT: &str = "predictionResult";
pub const KEY_UPLOADED_FILE_NAME: &str = "uploadedFileName";
pub const KEY_UPLOADED_CSV_DATA: &str = "uploadedCsvData";
pub const KEY_ANALYSIS_TYPE: &str = "analysisType";

/// Everything one successful submission leaves behind
#[derive(Debug, Clone, PartialEq)]
pub struct UploadBundle {
    pub file_name: String,
    pub csv_text: String,
    pub analysis_type: String,
    pub result: PredictionResult,
}

/// Consistent read of the session entries
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub result: PredictionResult,
    pub file_name: Option<String>,
    pub csv_text: Option<String>,
    pub analysis_type: Option<String>,
}

pub struct SessionContext {
    entries: RwLock<BTreeMap<String, String>>,
    backing_file: Option<PathBuf>,
}

impl SessionContext {
    /// Context that lives only as long as this value
    pub fn in_memory() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            backing_file: None,
        }
    }

    /// Context persisted to `path`
    ///
    /// A missing file starts an empty session. An unreadable or corrupt file
    /// is logged and treated as an empty session; it is replaced on the next
    /// commit.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(entries) => {
                    debug!(path = %path.display(), keys = entries.len(), "Loaded session");
                    entries
                }
                Err(e) => {
                    warn!("Discarding corrupt session file {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                warn!("Cannot read session file {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        Self {
            entries: RwLock::new(entries),
            backing_file: Some(path),
        }
    }

    /// Write a submission's filename, CSV, analysis type and result together
    ///
    /// Readers observe either the previous bundle or this one, never a mix.
    pub fn commit(&self, bundle: &UploadBundle) -> Result<()> {
        let encoded_result = serde_json::to_string(&bundle.result)?;

        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::Internal("Session lock poisoned".to_string()))?;

        let mut next = entries.clone();
        next.insert(KEY_UPLOADED_CSV_DATA.to_string(), bundle.csv_text.clone());
        next.insert(KEY_UPLOADED_FILE_NAME.to_string(), bundle.file_name.clone());
        next.insert(KEY_PREDICTION_RESULT.to_string(), encoded_result);
        next.insert(KEY_ANALYSIS_TYPE.to_string(), bundle.analysis_type.clone());

        if let Some(path) = &self.backing_file {
            persist(path, &next)?;
        }

        *entries = next;
        debug!(file_name = %bundle.file_name, "Session updated");
        Ok(())
    }

    /// Raw string value for a key
    pub fn get(&self, key: &str) -> Option<String> {
        self.read_entries().get(key).cloned()
    }

    /// Decoded prediction result, if one has been stored
    pub fn prediction_result(&self) -> Result<Option<PredictionResult>> {
        self.get(KEY_PREDICTION_RESULT)
            .map(|raw| serde_json::from_str(&raw).map_err(Error::from))
            .transpose()
    }

    pub fn uploaded_file_name(&self) -> Option<String> {
        self.get(KEY_UPLOADED_FILE_NAME)
    }

    pub fn uploaded_csv(&self) -> Option<String> {
        self.get(KEY_UPLOADED_CSV_DATA)
    }

    pub fn analysis_type(&self) -> Option<String> {
        self.get(KEY_ANALYSIS_TYPE)
    }

    /// All entries read under one lock; `None` when no result is stored
    pub fn snapshot(&self) -> Result<Option<SessionSnapshot>> {
        let entries = self.read_entries();
        let Some(raw) = entries.get(KEY_PREDICTION_RESULT) else {
            return Ok(None);
        };

        Ok(Some(SessionSnapshot {
            result: serde_json::from_str(raw)?,
            file_name: entries.get(KEY_UPLOADED_FILE_NAME).cloned(),
            csv_text: entries.get(KEY_UPLOADED_CSV_DATA).cloned(),
            analysis_type: entries.get(KEY_ANALYSIS_TYPE).cloned(),
        }))
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, String>> {
        // Writers never panic while holding the lock, so a poisoned guard
        // still holds the last committed map
        self.entries.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Distinguishes temp files of concurrent writers within one process
static PERSIST_SEQ: AtomicU64 = AtomicU64::new(0);

/// Write via a sibling temp file and rename so a crash never leaves half a file
///
/// The temp name is unique per writer, so concurrent commits from separate
/// processes never share one.
fn persist(path: &Path, entries: &BTreeMap<String, String>) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        std::fs::create_dir_all(parent)?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());
    let tmp_name = format!(
        ".{}.tmp.{}.{}",
        file_name,
        std::process::id(),
        PERSIST_SEQ.fetch_add(1, Ordering::Relaxed)
    );
    let tmp_path = match parent {
        Some(parent) => parent.join(tmp_name),
        None => PathBuf::from(tmp_name),
    };

    let written = write_synced(&tmp_path, &serde_json::to_vec(entries)?)
        .and_then(|()| std::fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(name: &str) -> UploadBundle {
        UploadBundle {
            file_name: name.to_string(),
            csv_text: "a,b\n1,2\n".to_string(),
            analysis_type: "durability".to_string(),
            result: PredictionResult::from_value(json!({"model": "durability", "rows": 1}))
                .unwrap(),
        }
    }

    #[test]
    fn test_empty_session_has_no_snapshot() {
        let session = SessionContext::in_memory();
        assert!(session.snapshot().unwrap().is_none());
        assert!(session.prediction_result().unwrap().is_none());
        assert!(session.uploaded_file_name().is_none());
    }

    #[test]
    fn test_commit_writes_all_keys() {
        let session = SessionContext::in_memory();
        session.commit(&bundle("engine.csv")).unwrap();

        assert_eq!(session.uploaded_file_name().as_deref(), Some("engine.csv"));
        assert_eq!(session.uploaded_csv().as_deref(), Some("a,b\n1,2\n"));
        assert_eq!(session.analysis_type().as_deref(), Some("durability"));

        let raw = session.get(KEY_PREDICTION_RESULT).unwrap();
        let decoded: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded, json!({"model": "durability", "rows": 1}));
    }

    #[test]
    fn test_second_commit_overwrites_bundle() {
        let session = SessionContext::in_memory();
        session.commit(&bundle("first.csv")).unwrap();
        session.commit(&bundle("second.csv")).unwrap();

        let snapshot = session.snapshot().unwrap().unwrap();
        assert_eq!(snapshot.file_name.as_deref(), Some("second.csv"));
    }

    #[test]
    fn test_corrupt_result_is_reported_not_panicked() {
        let session = SessionContext::in_memory();
        session
            .entries
            .write()
            .unwrap()
            .insert(KEY_PREDICTION_RESULT.to_string(), "{not json".to_string());

        assert!(matches!(session.prediction_result(), Err(Error::Json(_))));
        assert!(session.snapshot().is_err());
    }
}
