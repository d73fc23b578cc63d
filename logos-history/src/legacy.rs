//! Legacy flat-snapshot format and its conversion to delta entries.
//!
//! Before delta storage, a history file was a bare JSON array of full
//! snapshots, newest first:
//!
//! ```text
//! [ { "id": 1700000300000, "timestamp": "...", "content": "v3" },
//!   { "id": 1700000200000, "timestamp": "...", "content": "v2" },
//!   { "id": 1700000100000, "timestamp": "...", "content": "v1" } ]
//! ```
//!
//! Conversion makes the oldest snapshot the base and diffs each newer one
//! against its immediate predecessor. It is pure: callers decide whether the
//! result is ever written back.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::delta::create_delta;
use crate::frontmatter::derive_summary;
use crate::types::{DocumentType, VersionEntry, VersionId};

/// Prefix for ids synthesized for snapshots that carry none.
pub const SYNTHETIC_ID_PREFIX: &str = "legacy-";

/// Legacy snapshot id: older editors wrote epoch-millisecond numbers.
///
/// Values of any other shape are kept as-is and replaced by a synthesized id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyId {
    Number(u64),
    Text(String),
    Other(serde_json::Value),
}

impl LegacyId {
    fn to_version_id(&self) -> Option<VersionId> {
        match self {
            LegacyId::Number(n) => Some(VersionId::from(n.to_string())),
            LegacyId::Text(s) if !s.trim().is_empty() => Some(VersionId::from(s.as_str())),
            LegacyId::Text(_) | LegacyId::Other(_) => None,
        }
    }
}

/// Legacy timestamp: epoch milliseconds or an RFC 3339 string.
///
/// Anything else falls back to the file's timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyTimestamp {
    Millis(i64),
    Text(String),
    Other(serde_json::Value),
}

impl LegacyTimestamp {
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            LegacyTimestamp::Millis(ms) => DateTime::from_timestamp_millis(*ms),
            LegacyTimestamp::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            LegacyTimestamp::Other(_) => None,
        }
    }
}

/// One snapshot of the legacy format.
///
/// Unknown keys are preserved in `extra` so a migrated copy of the file is
/// byte-for-byte equivalent in content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacySnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LegacyId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<LegacyTimestamp>,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl LegacySnapshot {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}

/// Context a conversion needs beyond the snapshots themselves.
#[derive(Debug, Clone)]
pub struct LegacyContext {
    pub document_type: DocumentType,
    pub document_key: String,
    /// Used for snapshots without a readable timestamp (e.g. file mtime)
    pub fallback_timestamp: DateTime<Utc>,
    pub summary_max_chars: usize,
}

/// Convert flat snapshots into delta entries, newest first.
///
/// Snapshots are assumed newest first unless every one carries a timestamp
/// and they strictly ascend, in which case the array is read oldest first.
/// Missing ids are synthesized from position so repeated conversions of the
/// same file agree.
pub fn convert_to_delta_format(
    snapshots: &[LegacySnapshot],
    ctx: &LegacyContext,
) -> Vec<VersionEntry> {
    let mut oldest_first: Vec<&LegacySnapshot> = snapshots.iter().collect();
    if !is_ascending(snapshots) {
        oldest_first.reverse();
    }

    let mut used: HashSet<VersionId> = HashSet::with_capacity(snapshots.len());
    let mut entries: Vec<VersionEntry> = Vec::with_capacity(snapshots.len());
    let mut previous: Option<(&str, VersionId)> = None;

    for (position, snapshot) in oldest_first.into_iter().enumerate() {
        let id = snapshot
            .id
            .as_ref()
            .and_then(LegacyId::to_version_id)
            .filter(|id| !used.contains(id))
            .unwrap_or_else(|| synthesize_id(position, &used));
        used.insert(id.clone());

        let timestamp = snapshot
            .timestamp
            .as_ref()
            .and_then(LegacyTimestamp::to_datetime)
            .unwrap_or(ctx.fallback_timestamp);

        let summary = match snapshot.summary.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => derive_summary(s, ctx.summary_max_chars),
            _ => derive_summary(&snapshot.content, ctx.summary_max_chars),
        };

        let entry = match &previous {
            None => VersionEntry::base(
                id.clone(),
                timestamp,
                ctx.document_type,
                &ctx.document_key,
                summary,
                snapshot.content.as_str(),
            ),
            Some((prev_content, prev_id)) => VersionEntry::delta(
                id.clone(),
                timestamp,
                ctx.document_type,
                &ctx.document_key,
                summary,
                prev_id.clone(),
                create_delta(prev_content, &snapshot.content),
            ),
        };
        entries.push(entry);
        previous = Some((snapshot.content.as_str(), id));
    }

    entries.reverse();
    entries
}

fn is_ascending(snapshots: &[LegacySnapshot]) -> bool {
    let times: Option<Vec<DateTime<Utc>>> = snapshots
        .iter()
        .map(|s| s.timestamp.as_ref().and_then(LegacyTimestamp::to_datetime))
        .collect();
    match times {
        Some(times) if times.len() > 1 => times.windows(2).all(|w| w[0] < w[1]),
        _ => false,
    }
}

fn synthesize_id(position: usize, used: &HashSet<VersionId>) -> VersionId {
    let base = format!("{SYNTHETIC_ID_PREFIX}{}", position + 1);
    let mut candidate = VersionId::from(base.as_str());
    let mut n = 1;
    while used.contains(&candidate) {
        candidate = VersionId::from(format!("{base}-{n}"));
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::VersionChain;

    fn ctx() -> LegacyContext {
        LegacyContext {
            document_type: DocumentType::Post,
            document_key: "my-post".into(),
            fallback_timestamp: DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
            summary_max_chars: 100,
        }
    }

    fn parse(json: &str) -> Vec<LegacySnapshot> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_convert_newest_first_array() {
        let snapshots = parse(
            r##"[
                {"id": 1700000300000, "timestamp": "2023-11-14T22:18:20Z", "content": "# Three\nc\n"},
                {"id": 1700000200000, "timestamp": "2023-11-14T22:16:40Z", "content": "# Two\nb\n"},
                {"id": 1700000100000, "timestamp": "2023-11-14T22:15:00Z", "content": "# One\na\n", "summary": "first"}
            ]"##,
        );
        let entries = convert_to_delta_format(&snapshots, &ctx());
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id.as_str(), "1700000300000");
        assert!(entries[2].is_base());
        assert!(!entries[0].is_base());
        assert_eq!(entries[2].summary, "first");
        assert_eq!(entries[1].summary, "Two");

        let chain = VersionChain::from_entries(entries);
        for snapshot in &snapshots {
            let id = snapshot.id.as_ref().and_then(LegacyId::to_version_id).unwrap();
            assert_eq!(chain.reconstruct_content(&id).unwrap(), snapshot.content);
        }
    }

    #[test]
    fn test_convert_ascending_array() {
        let snapshots = parse(
            r#"[
                {"id": "a", "timestamp": 1000, "content": "old"},
                {"id": "b", "timestamp": 2000, "content": "new"}
            ]"#,
        );
        let entries = convert_to_delta_format(&snapshots, &ctx());
        assert_eq!(entries[0].id.as_str(), "b");
        assert_eq!(entries[1].id.as_str(), "a");
        assert!(entries[1].is_base());
    }

    #[test]
    fn test_missing_fields_synthesized_deterministically() {
        let snapshots = vec![LegacySnapshot::new("newer"), LegacySnapshot::new("older")];
        let first = convert_to_delta_format(&snapshots, &ctx());
        let second = convert_to_delta_format(&snapshots, &ctx());

        let ids: Vec<_> = first.iter().map(|e| e.id.as_str().to_string()).collect();
        assert_eq!(ids, vec!["legacy-2", "legacy-1"]);
        assert_eq!(first, second);
        assert_eq!(first[0].timestamp, ctx().fallback_timestamp);
        assert_eq!(first[0].summary, "newer");
    }

    #[test]
    fn test_duplicate_ids_disambiguated() {
        let snapshots = parse(
            r#"[{"id": "x", "content": "2"}, {"id": "x", "content": "1"}, {"id": "legacy-3", "content": "0"}]"#,
        );
        let entries = convert_to_delta_format(&snapshots, &ctx());
        let ids: HashSet<_> = entries.iter().map(|e| e.id.clone()).collect();
        assert_eq!(ids.len(), 3);

        let chain = VersionChain::from_entries(entries.clone());
        let contents: Vec<_> = entries
            .iter()
            .map(|e| chain.reconstruct_content(&e.id).unwrap())
            .collect();
        assert_eq!(contents, vec!["2", "1", "0"]);
    }

    #[test]
    fn test_extra_fields_preserved() {
        let snapshots = parse(r#"[{"content": "x", "author": "sam", "wordCount": 1}]"#);
        assert_eq!(snapshots[0].extra["author"], "sam");
        let back = serde_json::to_value(&snapshots).unwrap();
        assert_eq!(back[0]["wordCount"], 1);
    }

    #[test]
    fn test_odd_typed_fields_fall_back() {
        let snapshots = parse(
            r#"[
                {"id": "b", "timestamp": 1700000000000.5, "content": "b"},
                {"id": -4, "timestamp": {"at": 1}, "content": "a"},
                {"id": {"nested": true}, "timestamp": false, "content": "z"}
            ]"#,
        );
        assert!(matches!(snapshots[0].timestamp, Some(LegacyTimestamp::Other(_))));
        assert!(matches!(snapshots[1].id, Some(LegacyId::Other(_))));

        let entries = convert_to_delta_format(&snapshots, &ctx());
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["b", "legacy-2", "legacy-1"]);
        assert!(entries.iter().all(|e| e.timestamp == ctx().fallback_timestamp));

        let chain = VersionChain::from_entries(entries);
        assert_eq!(chain.reconstruct_content(&VersionId::from("legacy-1")).unwrap(), "z");
        assert_eq!(chain.reconstruct_content(&VersionId::from("b")).unwrap(), "b");

        // Odd values survive a rewrite of the legacy array
        let back = serde_json::to_value(&snapshots).unwrap();
        assert_eq!(back[1]["id"], -4);
    }

    #[test]
    fn test_empty_input() {
        assert!(convert_to_delta_format(&[], &ctx()).is_empty());
    }
}
