//! Identifier resolution with legacy-alias migration.
//!
//! ```text
//! resolve(type, identifier)
//!   │
//!   ├─ sanitize ────────────────────────────── fail → InvalidIdentifier
//!   │
//!   ├─ load <type>/<identifier>.json ───────── non-empty → done
//!   │
//!   └─ identifier looks like an opaque id?
//!        │ yes
//!        ├─ corpus: find document with that id → current slug
//!        ├─ load <type>/<slug>.json ───────── empty/missing → fresh history
//!        └─ copy it to <type>/<identifier>.json (one-time migration)
//! ```
//!
//! The editor now keys history by a document's stable id; histories written
//! when it keyed by slug are adopted the first time the id is used. Any
//! failure while searching for that alias degrades to an empty history.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{HistoryError, Result};
use crate::frontmatter::FrontMatter;
use crate::storage::{
    read_history_file, sanitize_identifier, write_history_file, HistoryFile, HistoryPaths,
    PathError,
};
use crate::types::DocumentType;

const CORPUS_EXTENSIONS: &[&str] = &["md", "mdx", "markdown"];

/// Lookup of live documents by their stable id.
pub trait DocumentCorpus: Send + Sync {
    /// Current slug of the document of `doc_type` whose stored id is `id`.
    fn find_slug_by_id(&self, doc_type: DocumentType, id: &str) -> io::Result<Option<String>>;
}

/// Corpus with no documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCorpus;

impl DocumentCorpus for NoCorpus {
    fn find_slug_by_id(&self, _doc_type: DocumentType, _id: &str) -> io::Result<Option<String>> {
        Ok(None)
    }
}

/// Markdown files under `<root>/posts` and `<root>/pages`, identified by
/// their frontmatter `id`.
#[derive(Debug, Clone)]
pub struct FsCorpus {
    root: PathBuf,
}

impl FsCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentCorpus for FsCorpus {
    fn find_slug_by_id(&self, doc_type: DocumentType, id: &str) -> io::Result<Option<String>> {
        let dir = self.root.join(doc_type.corpus_dir());
        let mut files: Vec<PathBuf> = match fs::read_dir(&dir) {
            Ok(read) => read
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| CORPUS_EXTENSIONS.contains(&ext))
                })
                .collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        files.sort();

        for path in files {
            let text = fs::read_to_string(&path)?;
            let matter = match FrontMatter::parse(&text) {
                Ok(Some((matter, _))) => matter,
                Ok(None) => continue,
                Err(e) => {
                    log::debug!("Skipping {}: bad frontmatter: {e}", path.display());
                    continue;
                }
            };
            if matter.id.as_deref() != Some(id) {
                continue;
            }
            let slug = matter.slug.or_else(|| {
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_string)
            });
            return Ok(slug);
        }
        Ok(None)
    }
}

/// Outcome of resolving an identifier.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub doc_type: DocumentType,
    /// Sanitized storage key
    pub key: String,
    /// History file for `key`
    pub path: PathBuf,
    /// Loaded history, if any
    pub history: Option<HistoryFile>,
    /// Slug-keyed file the history was adopted from, if any
    pub legacy_path: Option<PathBuf>,
    /// Whether this call wrote the migrated copy
    pub migrated: bool,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.history.as_ref().map_or(true, HistoryFile::is_empty)
    }
}

/// Maps caller identifiers to storage keys.
pub struct IdentifierResolver {
    paths: HistoryPaths,
    corpus: Arc<dyn DocumentCorpus>,
    legacy_id_prefixes: Vec<String>,
}

impl IdentifierResolver {
    pub fn new(
        paths: HistoryPaths,
        corpus: Arc<dyn DocumentCorpus>,
        legacy_id_prefixes: Vec<String>,
    ) -> Self {
        Self {
            paths,
            corpus,
            legacy_id_prefixes,
        }
    }

    pub(crate) fn set_corpus(&mut self, corpus: Arc<dyn DocumentCorpus>) {
        self.corpus = corpus;
    }

    /// Whether `identifier` has the shape of a stable document id.
    pub fn looks_like_opaque_id(&self, identifier: &str) -> bool {
        Uuid::parse_str(identifier).is_ok()
            || self
                .legacy_id_prefixes
                .iter()
                .any(|p| identifier.len() > p.len() && identifier.starts_with(p.as_str()))
    }

    /// Validate `identifier` and build its history path.
    pub fn locate(&self, doc_type: DocumentType, identifier: &str) -> Result<(String, PathBuf)> {
        let key = sanitize_identifier(identifier)
            .map_err(|problem| HistoryError::InvalidIdentifier {
                identifier: identifier.to_string(),
                problem,
            })?
            .to_string();
        let path = self
            .paths
            .history_file(doc_type, &key)
            .map_err(path_error)?;
        Ok((key, path))
    }

    /// Resolve `identifier` to its key and loaded history.
    pub fn resolve(&self, doc_type: DocumentType, identifier: &str) -> Result<Resolution> {
        let (key, path) = self.locate(doc_type, identifier)?;

        let history = read_history_file(&path)?;
        let mut resolution = Resolution {
            doc_type,
            key,
            path,
            history,
            legacy_path: None,
            migrated: false,
        };
        if !resolution.is_empty() {
            log::debug!("Resolved {doc_type} '{}' directly", resolution.key);
            return Ok(resolution);
        }

        let Some((legacy_path, legacy)) = self.find_legacy(doc_type, &resolution.key) else {
            return Ok(resolution);
        };

        let adopted = adopt(legacy, &resolution.key);
        match write_history_file(&resolution.path, &adopted) {
            Ok(()) => {
                log::info!(
                    "Migrated {doc_type} history from {} to '{}'",
                    legacy_path.display(),
                    resolution.key
                );
                resolution.migrated = true;
            }
            Err(e) => log::warn!(
                "Could not persist migrated history for {doc_type} '{}': {e}",
                resolution.key
            ),
        }
        resolution.history = Some(adopted);
        resolution.legacy_path = Some(legacy_path);
        Ok(resolution)
    }

    /// Slug-keyed history file aliased by `key`, if one exists.
    pub fn legacy_alias(&self, doc_type: DocumentType, key: &str) -> Option<PathBuf> {
        self.find_legacy(doc_type, key).map(|(path, _)| path)
    }

    /// Find a non-empty slug-keyed history for an opaque id. Never fails.
    fn find_legacy(&self, doc_type: DocumentType, key: &str) -> Option<(PathBuf, HistoryFile)> {
        if !self.looks_like_opaque_id(key) {
            return None;
        }

        let slug = match self.corpus.find_slug_by_id(doc_type, key) {
            Ok(Some(slug)) => slug,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("Legacy lookup for {doc_type} '{key}' failed: {e}");
                return None;
            }
        };
        if slug == key {
            return None;
        }

        let path = match self.paths.history_file(doc_type, &slug) {
            Ok(path) => path,
            Err(e) => {
                log::warn!("Ignoring legacy slug {slug:?} for '{key}': {e}");
                return None;
            }
        };
        match read_history_file(&path) {
            Ok(Some(file)) if !file.is_empty() => Some((path, file)),
            Ok(_) => None,
            Err(e) => {
                log::warn!("Ignoring unreadable legacy history {}: {e}", path.display());
                None
            }
        }
    }
}

/// Re-key adopted entries to the canonical key. Legacy arrays carry no key.
fn adopt(file: HistoryFile, key: &str) -> HistoryFile {
    match file {
        HistoryFile::Delta(mut doc) => {
            for entry in &mut doc.entries {
                entry.document_key = key.to_string();
            }
            HistoryFile::Delta(doc)
        }
        legacy @ HistoryFile::Legacy(_) => legacy,
    }
}

pub(crate) fn path_error(e: PathError) -> HistoryError {
    match e {
        PathError::Identifier(problem) => HistoryError::InvalidIdentifier {
            identifier: String::new(),
            problem,
        },
        PathError::Escape(path) => HistoryError::PathEscape { path },
        PathError::Io { path, source } => HistoryError::Persistence { path, source },
    }
}
