//! History store: the public API consumed by the editor layer.
//!
//! Every call is a single synchronous read-modify-write (or read-only) cycle
//! against one document's history file:
//!
//! ```text
//!  save_version ─► resolve ─► load chain ─► diff vs head ─► prepend
//!                 (+migrate)  (+legacy      │               │
//!                              convert)     │ identical?    ▼
//!                                           └─► Unchanged   truncate(10)
//!                                                           compact(5)
//!                                                           write file
//! ```
//!
//! No locking is done here; concurrent writers to one document race with
//! last-write-wins, which matches the single-editor usage.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::audit::{NullSink, SecurityEvent, SecurityEventKind, SecuritySink};
use crate::chain::VersionChain;
use crate::compact::compact_history;
use crate::config::HistoryConfig;
use crate::delta::create_delta;
use crate::error::{HistoryError, Result};
use crate::frontmatter::derive_summary;
use crate::legacy::{convert_to_delta_format, LegacyContext};
use crate::resolver::{DocumentCorpus, FsCorpus, IdentifierResolver, NoCorpus, Resolution};
use crate::storage::{
    modified_at, remove_history_file, write_history_file, DeltaDocument, HistoryFile, HistoryPaths,
};
use crate::types::{
    DeleteOutcome, DocumentType, HistoryStats, SaveOutcome, VersionComparison, VersionContent,
    VersionEntry, VersionId, VersionInfo,
};

/// Delta-compressed version history for posts and pages.
pub struct HistoryStore {
    config: HistoryConfig,
    resolver: IdentifierResolver,
    audit: Arc<dyn SecuritySink>,
}

impl HistoryStore {
    /// Open a store over `config.history_root`.
    ///
    /// Nothing is created on disk until the first save.
    pub fn open(config: HistoryConfig) -> Result<Self> {
        config.validate()?;
        let corpus: Arc<dyn DocumentCorpus> = match &config.content_root {
            Some(root) => Arc::new(FsCorpus::new(root)),
            None => Arc::new(NoCorpus),
        };
        let resolver = IdentifierResolver::new(
            HistoryPaths::new(&config.history_root),
            corpus,
            config.legacy_id_prefixes.clone(),
        );
        log::debug!("Opened history store at {}", config.history_root.display());
        Ok(Self {
            config,
            resolver,
            audit: Arc::new(NullSink),
        })
    }

    /// Replace the document corpus used for legacy alias lookup.
    pub fn with_corpus(mut self, corpus: Arc<dyn DocumentCorpus>) -> Self {
        self.resolver.set_corpus(corpus);
        self
    }

    /// Route security events to `sink`.
    pub fn with_audit_sink(mut self, sink: Arc<dyn SecuritySink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    // ─── Operations ───────────────────────────────────────────────────

    /// Record `content` as the newest version.
    ///
    /// Returns [`SaveOutcome::Unchanged`] without touching disk when the
    /// content matches the current head.
    pub fn save_version(
        &self,
        doc_type: DocumentType,
        identifier: &str,
        content: &str,
    ) -> Result<SaveOutcome> {
        let mut resolution = self.resolve(doc_type, identifier)?;
        let mut chain = self.load_chain(&mut resolution);

        let id = fresh_id(&chain);
        let now = Utc::now();
        let summary = derive_summary(content, self.config.summary_max_chars);

        let entry = match chain.head() {
            None => VersionEntry::base(id.clone(), now, doc_type, &resolution.key, summary, content),
            Some(head) => {
                let head_id = head.id.clone();
                let head_content = chain.reconstruct_content(&head_id)?;
                if head_content == content {
                    log::debug!("No changes for {doc_type} '{}'", resolution.key);
                    return Ok(SaveOutcome::Unchanged {
                        versions_kept: chain.len(),
                    });
                }
                let delta = create_delta(&head_content, content);
                VersionEntry::delta(id.clone(), now, doc_type, &resolution.key, summary, head_id, delta)
            }
        };

        chain.push_head(entry);
        let evicted = chain.truncate(self.config.max_versions)?;
        let report = compact_history(&mut chain, self.config.max_chain_length)?;
        let versions_kept = chain.len();
        self.persist(&resolution.path, chain)?;

        log::info!(
            "Saved {doc_type} '{}' version {id} ({versions_kept} kept, {} evicted, {} compacted)",
            resolution.key,
            evicted.len(),
            report.promoted.len()
        );
        Ok(SaveOutcome::Saved {
            version_id: id,
            versions_kept,
        })
    }

    /// Version metadata, newest first. Empty for documents without history.
    pub fn get_version_history(
        &self,
        doc_type: DocumentType,
        identifier: &str,
    ) -> Result<Vec<VersionInfo>> {
        let mut resolution = self.resolve(doc_type, identifier)?;
        let chain = self.load_chain(&mut resolution);
        Ok(chain.iter().map(VersionEntry::info).collect())
    }

    /// Full content and metadata of one version.
    pub fn get_version(
        &self,
        doc_type: DocumentType,
        identifier: &str,
        version_id: &VersionId,
    ) -> Result<VersionContent> {
        let (_, chain) = self.require_chain(doc_type, identifier)?;
        let entry = chain
            .get(version_id)
            .ok_or_else(|| HistoryError::VersionNotFound(version_id.clone()))?;
        let content = chain.reconstruct_content(version_id)?;
        Ok(VersionContent {
            info: entry.info(),
            content,
        })
    }

    /// Remove one version, keeping the rest reconstructable.
    pub fn delete_version(
        &self,
        doc_type: DocumentType,
        identifier: &str,
        version_id: &VersionId,
    ) -> Result<DeleteOutcome> {
        let (resolution, mut chain) = self.require_chain(doc_type, identifier)?;
        if !chain.contains(version_id) {
            return Err(HistoryError::VersionNotFound(version_id.clone()));
        }

        let removal = chain.remove(version_id)?;
        let versions_kept = chain.len();
        self.persist(&resolution.path, chain)?;

        log::info!(
            "Deleted {doc_type} '{}' version {version_id} ({} promoted, {} rebased)",
            resolution.key,
            removal.promoted.len(),
            removal.rebased.len()
        );
        Ok(DeleteOutcome {
            deleted: removal.removed.id,
            promoted: removal.promoted,
            rebased: removal.rebased,
            versions_kept,
        })
    }

    /// Delete a document's history file, plus the slug-keyed file it was
    /// migrated from. Returns whether anything was removed.
    pub fn clear_history(&self, doc_type: DocumentType, identifier: &str) -> Result<bool> {
        let (key, path) = self.locate(doc_type, identifier)?;

        let mut removed = remove_history_file(&path)?;
        if let Some(legacy) = self.resolver.legacy_alias(doc_type, &key) {
            removed |= remove_history_file(&legacy)?;
            log::info!("Cleared legacy alias {} for '{key}'", legacy.display());
        }
        if removed {
            log::info!("Cleared {doc_type} '{key}' history");
        }
        Ok(removed)
    }

    /// Size summary between two versions (`to` minus `from`).
    pub fn compare_versions(
        &self,
        doc_type: DocumentType,
        identifier: &str,
        from: &VersionId,
        to: &VersionId,
    ) -> Result<VersionComparison> {
        let (_, chain) = self.require_chain(doc_type, identifier)?;
        for id in [from, to] {
            if !chain.contains(id) {
                return Err(HistoryError::VersionNotFound(id.clone()));
            }
        }
        let from_text = chain.reconstruct_content(from)?;
        let to_text = chain.reconstruct_content(to)?;
        Ok(VersionComparison::new(from.clone(), &from_text, to.clone(), &to_text))
    }

    /// Storage statistics for one document.
    pub fn stats(&self, doc_type: DocumentType, identifier: &str) -> Result<HistoryStats> {
        let mut resolution = self.resolve(doc_type, identifier)?;
        let chain = self.load_chain(&mut resolution);

        let mut stats = HistoryStats {
            versions: chain.len(),
            ..HistoryStats::default()
        };
        for entry in chain.iter() {
            if entry.is_base() {
                stats.bases += 1;
            }
            stats.stored_bytes += entry.stored_bytes();
            stats.full_bytes += chain.reconstruct_content(&entry.id)?.len();
            stats.longest_chain = stats.longest_chain.max(chain.chain_length(&entry.id)?);
        }
        Ok(stats)
    }

    // ─── Helpers ──────────────────────────────────────────────────────

    fn locate(&self, doc_type: DocumentType, identifier: &str) -> Result<(String, PathBuf)> {
        self.resolver
            .locate(doc_type, identifier)
            .inspect_err(|e| self.report(doc_type, identifier, e))
    }

    fn resolve(&self, doc_type: DocumentType, identifier: &str) -> Result<Resolution> {
        self.resolver
            .resolve(doc_type, identifier)
            .inspect_err(|e| self.report(doc_type, identifier, e))
    }

    fn report(&self, doc_type: DocumentType, identifier: &str, err: &HistoryError) {
        let kind = match err {
            HistoryError::InvalidIdentifier { .. } => SecurityEventKind::InvalidIdentifier,
            HistoryError::PathEscape { .. } => SecurityEventKind::PathEscape,
            _ => return,
        };
        log::warn!("Rejected {doc_type} identifier {identifier:?}: {err}");
        self.audit
            .record(SecurityEvent::new(kind, doc_type, format!("{identifier:?}")));
    }

    /// Resolve and load, failing with `DocumentNotFound` for empty histories.
    fn require_chain(
        &self,
        doc_type: DocumentType,
        identifier: &str,
    ) -> Result<(Resolution, VersionChain)> {
        let mut resolution = self.resolve(doc_type, identifier)?;
        let chain = self.load_chain(&mut resolution);
        if chain.is_empty() {
            return Err(HistoryError::DocumentNotFound {
                doc_type,
                key: resolution.key,
            });
        }
        Ok((resolution, chain))
    }

    /// Take the loaded history out of `resolution` as a chain, converting
    /// legacy snapshots in memory.
    fn load_chain(&self, resolution: &mut Resolution) -> VersionChain {
        match resolution.history.take() {
            None => VersionChain::new(),
            Some(HistoryFile::Delta(doc)) => VersionChain::from_entries(doc.entries),
            Some(HistoryFile::Legacy(snapshots)) => {
                let ctx = LegacyContext {
                    document_type: resolution.doc_type,
                    document_key: resolution.key.clone(),
                    fallback_timestamp: fallback_timestamp(resolution),
                    summary_max_chars: self.config.summary_max_chars,
                };
                log::debug!(
                    "Converting {} legacy snapshots for {} '{}'",
                    snapshots.len(),
                    resolution.doc_type,
                    resolution.key
                );
                VersionChain::from_entries(convert_to_delta_format(&snapshots, &ctx))
            }
        }
    }

    /// Write `chain` as the document's history, or remove the file if empty.
    fn persist(&self, path: &Path, chain: VersionChain) -> Result<()> {
        if chain.is_empty() {
            remove_history_file(path)?;
            return Ok(());
        }
        let file = HistoryFile::Delta(DeltaDocument::new(chain.into_entries()));
        write_history_file(path, &file)
    }
}

fn fresh_id(chain: &VersionChain) -> VersionId {
    loop {
        let id = VersionId::generate();
        if !chain.contains(&id) {
            return id;
        }
    }
}

/// Timestamp for legacy snapshots that carry none: the source file's mtime.
fn fallback_timestamp(resolution: &Resolution) -> DateTime<Utc> {
    resolution
        .legacy_path
        .as_deref()
        .and_then(modified_at)
        .or_else(|| modified_at(&resolution.path))
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open(dir: &Path) -> HistoryStore {
        HistoryStore::open(HistoryConfig::for_testing(dir)).unwrap()
    }

    #[test]
    fn test_open_rejects_bad_config() {
        let dir = tempdir().unwrap();
        let config = HistoryConfig {
            max_versions: 0,
            ..HistoryConfig::for_testing(dir.path())
        };
        assert!(HistoryStore::open(config).is_err());
    }

    #[test]
    fn test_first_save_is_base() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());

        let outcome = store.save_version(DocumentType::Post, "my-post", "# Hello").unwrap();
        assert!(outcome.is_saved());
        assert_eq!(outcome.versions_kept(), 1);

        let history = store.get_version_history(DocumentType::Post, "my-post").unwrap();
        assert_eq!(history.len(), 1);
        assert!(history[0].is_base);
        assert_eq!(history[0].summary, "Hello");
    }

    #[test]
    fn test_unchanged_save_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());
        store.save_version(DocumentType::Page, "about", "same").unwrap();
        let path = dir.path().join("history").join("page").join("about.json");
        let before = std::fs::read(&path).unwrap();

        let outcome = store.save_version(DocumentType::Page, "about", "same").unwrap();
        assert_eq!(outcome, SaveOutcome::Unchanged { versions_kept: 1 });
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn test_not_found_errors() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());
        let missing = VersionId::from("missing");

        assert!(matches!(
            store.get_version(DocumentType::Post, "nothing", &missing),
            Err(HistoryError::DocumentNotFound { .. })
        ));
        store.save_version(DocumentType::Post, "doc", "text").unwrap();
        assert!(matches!(
            store.get_version(DocumentType::Post, "doc", &missing),
            Err(HistoryError::VersionNotFound(_))
        ));
        assert!(matches!(
            store.delete_version(DocumentType::Post, "doc", &missing),
            Err(HistoryError::VersionNotFound(_))
        ));
        assert!(store
            .get_version_history(DocumentType::Post, "nothing")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_delete_last_version_removes_file() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());
        let saved = store.save_version(DocumentType::Post, "solo", "only").unwrap();
        let id = saved.version_id().unwrap().clone();

        let outcome = store.delete_version(DocumentType::Post, "solo", &id).unwrap();
        assert_eq!(outcome.versions_kept, 0);
        assert!(!dir.path().join("history").join("post").join("solo.json").exists());
    }

    #[test]
    fn test_stats_reflect_compression() {
        let dir = tempdir().unwrap();
        let store = open(dir.path());
        let mut text = "A paragraph of text that stays the same across saves.\n".repeat(40);
        for i in 0..7 {
            text.push_str(&format!("edit {i}\n"));
            store.save_version(DocumentType::Post, "big", &text).unwrap();
        }
        let stats = store.stats(DocumentType::Post, "big").unwrap();
        assert_eq!(stats.versions, 7);
        assert_eq!(stats.bases, 2);
        assert_eq!(stats.longest_chain, 4);
        assert!(stats.compression_ratio() > 2.0, "ratio {}", stats.compression_ratio());
    }
}
