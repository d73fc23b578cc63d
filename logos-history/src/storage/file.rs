//! History file codec and whole-file persistence.
//!
//! A history file is either the current schema object or a legacy bare
//! array; the JSON top-level type decides which:
//!
//! ```text
//! { "schemaVersion": 2, "useDelta": true, "entries": [ … ] }   → Delta
//! [ { "content": "…" }, … ]                                    → Legacy
//! ```
//!
//! Writes go to a temp file in the target directory which is then renamed
//! over the destination, so readers see either the old file or the new one.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{HistoryError, Result};
use crate::legacy::LegacySnapshot;
use crate::types::VersionEntry;

/// Schema version written by this crate.
pub const SCHEMA_VERSION: u32 = 2;

/// Current on-disk container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaDocument {
    pub schema_version: u32,
    pub use_delta: bool,
    /// Newest first
    pub entries: Vec<VersionEntry>,
}

impl DeltaDocument {
    pub fn new(entries: Vec<VersionEntry>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            use_delta: true,
            entries,
        }
    }
}

/// Decoded history file.
#[derive(Debug, Clone, PartialEq)]
pub enum HistoryFile {
    Delta(DeltaDocument),
    Legacy(Vec<LegacySnapshot>),
}

impl HistoryFile {
    pub fn len(&self) -> usize {
        match self {
            HistoryFile::Delta(doc) => doc.entries.len(),
            HistoryFile::Legacy(snapshots) => snapshots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, HistoryFile::Legacy(_))
    }

    /// Decode file bytes.
    pub fn decode(path: &Path, bytes: &[u8]) -> Result<Self> {
        let corrupt = |reason: String| HistoryError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };

        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| corrupt(e.to_string()))?;
        match value {
            serde_json::Value::Array(_) => serde_json::from_value(value)
                .map(HistoryFile::Legacy)
                .map_err(|e| corrupt(format!("legacy snapshots: {e}"))),
            serde_json::Value::Object(_) => {
                let doc: DeltaDocument =
                    serde_json::from_value(value).map_err(|e| corrupt(e.to_string()))?;
                if doc.schema_version > SCHEMA_VERSION {
                    return Err(corrupt(format!(
                        "unsupported schema version {} (newest known is {SCHEMA_VERSION})",
                        doc.schema_version
                    )));
                }
                Ok(HistoryFile::Delta(doc))
            }
            other => Err(corrupt(format!("unexpected top-level JSON value: {other}"))),
        }
    }

    /// Encode for writing. Legacy files are re-encoded as a bare array.
    pub fn encode(&self, path: &Path) -> Result<Vec<u8>> {
        let encoded = match self {
            HistoryFile::Delta(doc) => serde_json::to_vec_pretty(doc),
            HistoryFile::Legacy(snapshots) => serde_json::to_vec_pretty(snapshots),
        };
        encoded.map_err(|e| HistoryError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("encode failed: {e}"),
        })
    }
}

/// Read and decode a history file; `None` if it does not exist.
pub fn read_history_file(path: &Path) -> Result<Option<HistoryFile>> {
    match fs::read(path) {
        Ok(bytes) => HistoryFile::decode(path, &bytes).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(HistoryError::io(path, e)),
    }
}

/// Replace the history file at `path` with `file`.
pub fn write_history_file(path: &Path, file: &HistoryFile) -> Result<()> {
    let bytes = file.encode(path)?;
    atomic_write(path, &bytes)
}

/// Delete a history file. Returns whether one existed.
pub fn remove_history_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(HistoryError::io(path, e)),
    }
}

/// Last-modified time of `path`, if readable.
pub fn modified_at(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        HistoryError::io(
            path,
            io::Error::new(io::ErrorKind::InvalidInput, "history path has no parent"),
        )
    })?;
    fs::create_dir_all(dir).map_err(|e| HistoryError::io(dir, e))?;

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| HistoryError::io(dir, e))?;
    temp.write_all(data)
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|e| HistoryError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| HistoryError::io(path, e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DocumentType, VersionId};
    use tempfile::tempdir;

    fn sample_doc() -> HistoryFile {
        HistoryFile::Delta(DeltaDocument::new(vec![VersionEntry::base(
            VersionId::from("v1"),
            Utc::now(),
            DocumentType::Post,
            "my-post",
            "Hello",
            "# Hello",
        )]))
    }

    #[test]
    fn test_write_read_delta_document() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("post").join("my-post.json");
        let file = sample_doc();

        write_history_file(&path, &file).unwrap();
        let loaded = read_history_file(&path).unwrap().unwrap();
        assert_eq!(loaded, file);

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["schemaVersion"], 2);
        assert_eq!(raw["useDelta"], true);
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempdir().unwrap();
        assert!(read_history_file(&dir.path().join("nope.json")).unwrap().is_none());
        assert!(!remove_history_file(&dir.path().join("nope.json")).unwrap());
    }

    #[test]
    fn test_legacy_array_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("old.json");
        fs::write(&path, r#"[{"content": "a"}, {"content": "b"}]"#).unwrap();
        let file = read_history_file(&path).unwrap().unwrap();
        assert!(file.is_legacy());
        assert_eq!(file.len(), 2);
    }

    #[test]
    fn test_corrupt_files_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");

        for bad in ["{not json", "42", r#"{"schemaVersion": 9, "useDelta": true, "entries": []}"#] {
            fs::write(&path, bad).unwrap();
            assert!(
                matches!(read_history_file(&path), Err(HistoryError::Corrupt { .. })),
                "{bad} should be corrupt"
            );
        }
    }

    #[test]
    fn test_overwrite_replaces_whole_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.json");
        write_history_file(&path, &HistoryFile::Legacy(vec![LegacySnapshot::new("long ".repeat(100))]))
            .unwrap();
        write_history_file(&path, &HistoryFile::Legacy(vec![])).unwrap();
        let file = read_history_file(&path).unwrap().unwrap();
        assert!(file.is_empty());
        // No temp files left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
