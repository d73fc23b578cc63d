//! Identifier sanitization and root-confined history paths.
//!
//! Layout:
//! ```text
//! <history_root>/
//! ├── post/
//! │   ├── my-post.json
//! │   └── 0190f5c2-….json
//! └── page/
//!     └── about.json
//! ```
//!
//! Identifiers are validated before any filesystem access. Paths are then
//! checked against the real (symlink-resolved) history root; a path that
//! would land outside it is rejected, never clamped.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::types::DocumentType;

/// Longest accepted identifier, in bytes.
pub const MAX_IDENTIFIER_LEN: usize = 200;

const HISTORY_EXTENSION: &str = "json";

/// Why an identifier was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierProblem {
    #[error("identifier is empty")]
    Empty,
    #[error("identifier is longer than {MAX_IDENTIFIER_LEN} bytes")]
    TooLong,
    #[error("identifier contains a null byte")]
    NullByte,
    #[error("identifier contains a traversal sequence")]
    Traversal,
    #[error("identifier contains a path separator")]
    Separator,
    #[error("identifier contains disallowed character {0:?}")]
    Disallowed(char),
}

/// Validate a caller-supplied identifier.
///
/// Accepts ASCII letters, digits, `-` and `_` only.
pub fn sanitize_identifier(identifier: &str) -> Result<&str, IdentifierProblem> {
    if identifier.is_empty() {
        return Err(IdentifierProblem::Empty);
    }
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(IdentifierProblem::TooLong);
    }
    if identifier.contains('\0') {
        return Err(IdentifierProblem::NullByte);
    }
    if identifier.contains("..") {
        return Err(IdentifierProblem::Traversal);
    }
    if identifier.contains(['/', '\\']) {
        return Err(IdentifierProblem::Separator);
    }
    if let Some(bad) = identifier
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return Err(IdentifierProblem::Disallowed(bad));
    }
    Ok(identifier)
}

/// Path construction failures.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error(transparent)]
    Identifier(#[from] IdentifierProblem),
    #[error("path escapes history root: {}", .0.display())]
    Escape(PathBuf),
    #[error("cannot inspect {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Builds history file paths under a fixed root.
#[derive(Debug, Clone)]
pub struct HistoryPaths {
    root: PathBuf,
}

impl HistoryPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding histories of one document type.
    pub fn type_dir(&self, doc_type: DocumentType) -> PathBuf {
        self.root.join(doc_type.as_str())
    }

    /// History file for `(doc_type, key)`, checked to stay inside the root.
    pub fn history_file(&self, doc_type: DocumentType, key: &str) -> Result<PathBuf, PathError> {
        let key = sanitize_identifier(key)?;
        let path = self
            .type_dir(doc_type)
            .join(format!("{key}.{HISTORY_EXTENSION}"));
        self.confine(&path)?;
        Ok(path)
    }

    /// Reject `candidate` if it, or its nearest existing ancestor below the
    /// root, resolves outside the root.
    fn confine(&self, candidate: &Path) -> Result<(), PathError> {
        let real_root = match fs::canonicalize(&self.root) {
            Ok(root) => root,
            // Nothing exists yet; the path was built from sanitized parts.
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(source) => {
                return Err(PathError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        for probe in candidate.ancestors() {
            if probe == self.root {
                break;
            }
            match fs::symlink_metadata(probe) {
                Ok(_) => {
                    let real = fs::canonicalize(probe)
                        .map_err(|_| PathError::Escape(candidate.to_path_buf()))?;
                    if !real.starts_with(&real_root) {
                        return Err(PathError::Escape(candidate.to_path_buf()));
                    }
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(source) => {
                    return Err(PathError::Io {
                        path: probe.to_path_buf(),
                        source,
                    })
                }
            }
        }
        Ok(())
    }
}
