//! History store configuration.

use std::path::PathBuf;

use crate::error::{HistoryError, Result};

/// Store configuration.
#[derive(Debug, Clone)]
pub struct HistoryConfig {
    /// Directory holding `<type>/<key>.json` history files
    pub history_root: PathBuf,
    /// Live document corpus (`posts/`, `pages/`) used to follow legacy
    /// aliases. `None` disables alias lookup.
    pub content_root: Option<PathBuf>,
    /// Versions retained per document (default: 10)
    pub max_versions: usize,
    /// Chain length at which an entry is rewritten as a base (default: 5)
    pub max_chain_length: usize,
    /// Summary length limit in characters (default: 100)
    pub summary_max_chars: usize,
    /// Prefixes marking legacy opaque ids, besides UUIDs
    pub legacy_id_prefixes: Vec<String>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            history_root: PathBuf::from("logos_data").join("history"),
            content_root: None,
            max_versions: 10,
            max_chain_length: 5,
            summary_max_chars: 100,
            legacy_id_prefixes: vec!["legacy_".to_string()],
        }
    }
}

impl HistoryConfig {
    /// Config rooted in a test directory.
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        let root: PathBuf = path.into();
        Self {
            history_root: root.join("history"),
            content_root: Some(root.join("content")),
            ..Self::default()
        }
    }

    /// Reject values the store cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.max_versions == 0 {
            return Err(HistoryError::Config("max_versions must be at least 1".into()));
        }
        if self.max_chain_length == 0 {
            return Err(HistoryError::Config("max_chain_length must be at least 1".into()));
        }
        if self.summary_max_chars == 0 {
            return Err(HistoryError::Config("summary_max_chars must be at least 1".into()));
        }
        if self.legacy_id_prefixes.iter().any(|p| p.is_empty()) {
            return Err(HistoryError::Config("legacy id prefixes must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HistoryConfig::default();
        assert_eq!(config.max_versions, 10);
        assert_eq!(config.max_chain_length, 5);
        assert_eq!(config.summary_max_chars, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_for_testing_layout() {
        let config = HistoryConfig::for_testing("/tmp/t");
        assert_eq!(config.history_root, PathBuf::from("/tmp/t/history"));
        assert_eq!(config.content_root, Some(PathBuf::from("/tmp/t/content")));
    }

    #[test]
    fn test_validate_rejects_zero_retention() {
        let config = HistoryConfig {
            max_versions: 0,
            ..HistoryConfig::default()
        };
        assert!(matches!(config.validate(), Err(HistoryError::Config(_))));

        let config = HistoryConfig {
            max_chain_length: 0,
            ..HistoryConfig::default()
        };
        assert!(matches!(config.validate(), Err(HistoryError::Config(_))));

        let config = HistoryConfig {
            legacy_id_prefixes: vec![String::new()],
            ..HistoryConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
