//! Error taxonomy for the history store.
//!
//! Every public operation returns [`HistoryError`]. Module-local errors
//! (delta replay, chain walking, identifier validation) convert into it so the
//! caller sees one type and can match on the failure class:
//!
//! | Variant              | Meaning                                          |
//! |----------------------|--------------------------------------------------|
//! | `InvalidIdentifier`  | Unsafe or malformed slug, rejected before I/O    |
//! | `PathEscape`         | Constructed path resolves outside the root       |
//! | `DocumentNotFound`   | No history exists for the document               |
//! | `VersionNotFound`    | The version id is not retained                   |
//! | `Reconstruction`     | Chain does not terminate in a base (corruption)  |
//! | `Persistence`        | Filesystem failure                               |
//! | `Corrupt`            | History file exists but cannot be decoded        |
//!
//! A save whose content matches the head is not an error; see
//! [`SaveOutcome::Unchanged`](crate::types::SaveOutcome::Unchanged).

use std::path::PathBuf;

use thiserror::Error;

use crate::chain::ReconstructError;
use crate::storage::paths::IdentifierProblem;
use crate::types::{DocumentType, VersionId};

/// History store errors.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// Identifier failed the path-safety sanitizer
    #[error("Invalid identifier {identifier:?}: {problem}")]
    InvalidIdentifier {
        identifier: String,
        problem: IdentifierProblem,
    },

    /// A history path resolved (through symlinks) outside the history root
    #[error("Path escapes history root: {}", .path.display())]
    PathEscape { path: PathBuf },

    /// No history exists for this document
    #[error("No history for {doc_type} '{key}'")]
    DocumentNotFound { doc_type: DocumentType, key: String },

    /// Version id is not present in the document's history
    #[error("Version not found: {0}")]
    VersionNotFound(VersionId),

    /// A retained entry cannot be rebuilt from a base
    #[error("Reconstruction failed: {0}")]
    Reconstruction(#[from] ReconstructError),

    /// Filesystem failure while reading or writing history
    #[error("I/O failure on {}: {source}", .path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// History file exists but its contents cannot be decoded
    #[error("Corrupt history file {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl HistoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        HistoryError::Persistence {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is a security rejection (bad identifier or path escape).
    pub fn is_security_fault(&self) -> bool {
        matches!(
            self,
            HistoryError::InvalidIdentifier { .. } | HistoryError::PathEscape { .. }
        )
    }

    /// Whether this error means "nothing there" rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            HistoryError::DocumentNotFound { .. } | HistoryError::VersionNotFound(_)
        )
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = HistoryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HistoryError::VersionNotFound(VersionId::from("v-1"));
        assert!(err.to_string().contains("v-1"));
        assert!(err.is_not_found());

        let err = HistoryError::InvalidIdentifier {
            identifier: "../etc".into(),
            problem: IdentifierProblem::Traversal,
        };
        assert!(err.to_string().contains("../etc"));
        assert!(err.is_security_fault());
    }

    #[test]
    fn test_persistence_error_keeps_source() {
        let err = HistoryError::io(
            "/tmp/x.json",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("/tmp/x.json"));
        assert!(!err.is_security_fault());
    }
}
