//! Core value types: document kinds, version ids, history entries and the
//! outcome structs returned to the editor layer.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::delta::Delta;

/// Kind of editable document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Post,
    Page,
}

impl DocumentType {
    /// Tag used in history paths and persisted entries.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Post => "post",
            DocumentType::Page => "page",
        }
    }

    /// Directory holding live documents of this type in the content corpus.
    pub fn corpus_dir(&self) -> &'static str {
        match self {
            DocumentType::Post => "posts",
            DocumentType::Page => "pages",
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown document type tag.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown document type: {0}")]
pub struct ParseDocumentTypeError(pub String);

impl FromStr for DocumentType {
    type Err = ParseDocumentTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "post" | "posts" => Ok(DocumentType::Post),
            "page" | "pages" => Ok(DocumentType::Page),
            other => Err(ParseDocumentTypeError(other.to_string())),
        }
    }
}

/// Opaque version handle.
///
/// Fresh ids are UUIDv7 strings, so lexical order follows creation order.
/// Ids adopted from legacy snapshots are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    /// Generate a new time-ordered id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for VersionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VersionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What an entry stores: full text, or a patch against its predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Base(String),
    Delta(Delta),
}

/// One retained revision of a document.
///
/// Persisted as a camelCase JSON object carrying `isBase` and exactly one of
/// `content` or `delta`. `basedOnId` names the entry a delta was computed
/// against; files written before the field existed leave it unset and the
/// link is inferred from list position on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEntry", into = "RawEntry")]
pub struct VersionEntry {
    pub id: VersionId,
    pub timestamp: DateTime<Utc>,
    pub document_type: DocumentType,
    pub document_key: String,
    pub summary: String,
    pub based_on: Option<VersionId>,
    pub payload: Payload,
}

impl VersionEntry {
    /// Create a base entry holding full content.
    pub fn base(
        id: VersionId,
        timestamp: DateTime<Utc>,
        document_type: DocumentType,
        document_key: impl Into<String>,
        summary: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id,
            timestamp,
            document_type,
            document_key: document_key.into(),
            summary: summary.into(),
            based_on: None,
            payload: Payload::Base(content.into()),
        }
    }

    /// Create a delta entry based on `based_on`.
    pub fn delta(
        id: VersionId,
        timestamp: DateTime<Utc>,
        document_type: DocumentType,
        document_key: impl Into<String>,
        summary: impl Into<String>,
        based_on: VersionId,
        delta: Delta,
    ) -> Self {
        Self {
            id,
            timestamp,
            document_type,
            document_key: document_key.into(),
            summary: summary.into(),
            based_on: Some(based_on),
            payload: Payload::Delta(delta),
        }
    }

    pub fn is_base(&self) -> bool {
        matches!(self.payload, Payload::Base(_))
    }

    /// Rewrite this entry in place as a base holding `content`.
    pub fn promote_to_base(&mut self, content: String) {
        self.payload = Payload::Base(content);
        self.based_on = None;
    }

    /// Approximate bytes this entry occupies in the history file payload.
    pub fn stored_bytes(&self) -> usize {
        match &self.payload {
            Payload::Base(content) => content.len(),
            Payload::Delta(delta) => delta.payload_bytes(),
        }
    }

    /// Metadata view without content.
    pub fn info(&self) -> VersionInfo {
        VersionInfo {
            id: self.id.clone(),
            timestamp: self.timestamp,
            summary: self.summary.clone(),
            is_base: self.is_base(),
        }
    }
}

/// Wire shape of [`VersionEntry`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEntry {
    id: VersionId,
    timestamp: DateTime<Utc>,
    document_type: DocumentType,
    document_key: String,
    #[serde(default)]
    summary: String,
    is_base: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    delta: Option<Delta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    based_on_id: Option<VersionId>,
}

impl TryFrom<RawEntry> for VersionEntry {
    type Error = String;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let payload = match (raw.is_base, raw.content, raw.delta) {
            (true, Some(content), None) => Payload::Base(content),
            (false, None, Some(delta)) => Payload::Delta(delta),
            (true, _, _) => {
                return Err(format!("base entry {} must carry content and no delta", raw.id))
            }
            (false, _, _) => {
                return Err(format!("delta entry {} must carry a delta and no content", raw.id))
            }
        };
        let based_on = match payload {
            Payload::Base(_) => None,
            Payload::Delta(_) => raw.based_on_id,
        };
        Ok(Self {
            id: raw.id,
            timestamp: raw.timestamp,
            document_type: raw.document_type,
            document_key: raw.document_key,
            summary: raw.summary,
            based_on,
            payload,
        })
    }
}

impl From<VersionEntry> for RawEntry {
    fn from(entry: VersionEntry) -> Self {
        let (is_base, content, delta) = match entry.payload {
            Payload::Base(content) => (true, Some(content), None),
            Payload::Delta(delta) => (false, None, Some(delta)),
        };
        Self {
            id: entry.id,
            timestamp: entry.timestamp,
            document_type: entry.document_type,
            document_key: entry.document_key,
            summary: entry.summary,
            is_base,
            content,
            delta,
            based_on_id: entry.based_on,
        }
    }
}

/// Version metadata returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub id: VersionId,
    pub timestamp: DateTime<Utc>,
    pub summary: String,
    pub is_base: bool,
}

/// A reconstructed version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionContent {
    #[serde(flatten)]
    pub info: VersionInfo,
    pub content: String,
}

/// Result of a save request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// A new version was written.
    Saved {
        version_id: VersionId,
        versions_kept: usize,
    },
    /// Content matched the current head; nothing was written.
    Unchanged { versions_kept: usize },
}

impl SaveOutcome {
    pub fn is_saved(&self) -> bool {
        matches!(self, SaveOutcome::Saved { .. })
    }

    pub fn version_id(&self) -> Option<&VersionId> {
        match self {
            SaveOutcome::Saved { version_id, .. } => Some(version_id),
            SaveOutcome::Unchanged { .. } => None,
        }
    }

    pub fn versions_kept(&self) -> usize {
        match self {
            SaveOutcome::Saved { versions_kept, .. } | SaveOutcome::Unchanged { versions_kept } => {
                *versions_kept
            }
        }
    }
}

/// Result of a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted: VersionId,
    /// Entries rewritten as bases because they depended on the deleted entry.
    pub promoted: Vec<VersionId>,
    /// Entries whose delta was recomputed against the deleted entry's predecessor.
    pub rebased: Vec<VersionId>,
    pub versions_kept: usize,
}

/// Size summary of one version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSize {
    pub lines: usize,
    pub chars: usize,
    pub bytes: usize,
}

impl TextSize {
    pub fn of(text: &str) -> Self {
        Self {
            lines: text.lines().count(),
            chars: text.chars().count(),
            bytes: text.len(),
        }
    }
}

/// Size comparison between two versions (`to` minus `from`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionComparison {
    pub from: VersionId,
    pub to: VersionId,
    pub from_size: TextSize,
    pub to_size: TextSize,
    pub line_delta: i64,
    pub char_delta: i64,
}

impl VersionComparison {
    pub fn new(from: VersionId, from_text: &str, to: VersionId, to_text: &str) -> Self {
        let from_size = TextSize::of(from_text);
        let to_size = TextSize::of(to_text);
        Self {
            from,
            to,
            from_size,
            to_size,
            line_delta: to_size.lines as i64 - from_size.lines as i64,
            char_delta: to_size.chars as i64 - from_size.chars as i64,
        }
    }
}

/// Storage statistics for one document's history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub versions: usize,
    pub bases: usize,
    /// Longest delta chain from any entry to its base
    pub longest_chain: usize,
    /// Bytes held in entry payloads (base content + delta inserts)
    pub stored_bytes: usize,
    /// Bytes of all versions if stored as full snapshots
    pub full_bytes: usize,
}

impl HistoryStats {
    /// Full-snapshot size over stored size.
    pub fn compression_ratio(&self) -> f64 {
        if self.stored_bytes == 0 {
            return 0.0;
        }
        self.full_bytes as f64 / self.stored_bytes as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::create_delta;

    fn sample_delta_entry() -> VersionEntry {
        VersionEntry::delta(
            VersionId::from("v2"),
            Utc::now(),
            DocumentType::Post,
            "my-post",
            "Hello",
            VersionId::from("v1"),
            create_delta("# Hello", "# Hello World"),
        )
    }

    #[test]
    fn test_document_type_parse() {
        assert_eq!("post".parse::<DocumentType>().unwrap(), DocumentType::Post);
        assert_eq!("pages".parse::<DocumentType>().unwrap(), DocumentType::Page);
        assert!("draft".parse::<DocumentType>().is_err());
        assert_eq!(DocumentType::Page.to_string(), "page");
    }

    #[test]
    fn test_generated_ids_are_ordered() {
        let a = VersionId::generate();
        let b = VersionId::generate();
        assert!(a < b, "{a} should sort before {b}");
    }

    #[test]
    fn test_entry_json_shape() {
        let entry = VersionEntry::base(
            VersionId::from("v1"),
            Utc::now(),
            DocumentType::Post,
            "my-post",
            "Hello",
            "# Hello",
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["isBase"], true);
        assert_eq!(json["content"], "# Hello");
        assert_eq!(json["documentType"], "post");
        assert!(json.get("delta").is_none());
        assert!(json.get("basedOnId").is_none());

        let json = serde_json::to_value(sample_delta_entry()).unwrap();
        assert_eq!(json["isBase"], false);
        assert_eq!(json["basedOnId"], "v1");
        assert!(json.get("content").is_none());
    }

    #[test]
    fn test_entry_rejects_mixed_payload() {
        let json = serde_json::json!({
            "id": "v1",
            "timestamp": "2024-01-01T00:00:00Z",
            "documentType": "post",
            "documentKey": "x",
            "summary": "",
            "isBase": true,
        });
        assert!(serde_json::from_value::<VersionEntry>(json).is_err());
    }

    #[test]
    fn test_entry_without_based_on_id() {
        let mut json = serde_json::to_value(sample_delta_entry()).unwrap();
        json.as_object_mut().unwrap().remove("basedOnId");
        let entry: VersionEntry = serde_json::from_value(json).unwrap();
        assert!(entry.based_on.is_none());
        assert!(!entry.is_base());
    }

    #[test]
    fn test_save_outcome_accessors() {
        let saved = SaveOutcome::Saved {
            version_id: VersionId::from("v1"),
            versions_kept: 3,
        };
        assert!(saved.is_saved());
        assert_eq!(saved.versions_kept(), 3);

        let unchanged = SaveOutcome::Unchanged { versions_kept: 3 };
        assert!(!unchanged.is_saved());
        assert!(unchanged.version_id().is_none());
    }

    #[test]
    fn test_comparison_deltas() {
        let cmp = VersionComparison::new(
            VersionId::from("a"),
            "one\ntwo",
            VersionId::from("b"),
            "one\ntwo\nthree\n",
        );
        assert_eq!(cmp.from_size.lines, 2);
        assert_eq!(cmp.to_size.lines, 3);
        assert_eq!(cmp.line_delta, 1);
        assert_eq!(cmp.char_delta, 7);
    }
}
