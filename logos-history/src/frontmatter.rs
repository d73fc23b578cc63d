//! Typed document frontmatter and version summary derivation.
//!
//! Documents in the content corpus start with a YAML block:
//!
//! ```text
//! ---
//! id: 5f0c...      ← opaque id, stable across renames
//! slug: my-post    ← current slug (defaults to the file stem)
//! title: My Post
//! tags: [a, b]     ← anything else lands in `extra`
//! ---
//! # Body
//! ```
//!
//! Only the fields the history core needs are named; every other key is kept
//! in an ordered side map so a parse/serialize cycle loses nothing.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

const UNTITLED: &str = "Untitled";

/// Frontmatter fields used by the history core.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrontMatter {
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub slug: Option<String>,
    #[serde(
        default,
        deserialize_with = "scalar_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub title: Option<String>,
    /// Keys the core does not interpret
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl FrontMatter {
    /// Parse the frontmatter block of `text`, returning it with the body.
    ///
    /// Text without a frontmatter block yields `None`.
    pub fn parse(text: &str) -> Result<Option<(FrontMatter, &str)>, serde_yaml::Error> {
        let Some((yaml, body)) = split_front_matter(text) else {
            return Ok(None);
        };
        if yaml.trim().is_empty() {
            return Ok(Some((FrontMatter::default(), body)));
        }
        let matter = serde_yaml::from_str(yaml)?;
        Ok(Some((matter, body)))
    }

    /// Render back to a YAML block (including fences).
    pub fn to_block(&self) -> Result<String, serde_yaml::Error> {
        let yaml = serde_yaml::to_string(self)?;
        Ok(format!("---\n{yaml}---\n"))
    }
}

/// Split `---` fenced frontmatter from the body.
pub fn split_front_matter(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix("---")?;
    let rest = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let fence = line.trim_end_matches(['\r', '\n']);
        if fence == "---" || fence == "..." {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Derive a short label for a version.
///
/// First Markdown heading of the body, else the frontmatter title, else the
/// first non-empty line; truncated to `max_chars` characters.
pub fn derive_summary(content: &str, max_chars: usize) -> String {
    let (matter, body) = match FrontMatter::parse(content) {
        Ok(Some((matter, body))) => (Some(matter), body),
        _ => (None, content),
    };

    let label = first_heading(body)
        .or_else(|| matter.and_then(|m| m.title).filter(|t| !t.trim().is_empty()))
        .or_else(|| {
            body.lines()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| UNTITLED.to_string());

    truncate_chars(label.trim(), max_chars)
}

fn first_heading(body: &str) -> Option<String> {
    body.lines().find_map(|line| {
        let line = line.trim_start();
        let hashes = line.chars().take_while(|c| *c == '#').count();
        if !(1..=6).contains(&hashes) {
            return None;
        }
        let rest = &line[hashes..];
        if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
            return None;
        }
        let text = rest.trim().trim_end_matches('#').trim();
        (!text.is_empty()).then(|| text.to_string())
    })
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

/// Accept YAML strings, numbers and booleans as text.
fn scalar_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_yaml::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_yaml::Value::String(s)) => Some(s),
        Some(serde_yaml::Value::Number(n)) => Some(n.to_string()),
        Some(serde_yaml::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "---\nid: 7d9f3c2e-1b4a-4c8e-9f00-123456789abc\nslug: my-post\ntitle: My Post\ntags:\n  - rust\ndraft: true\n---\n# Hello\n\nBody text.\n";

    #[test]
    fn test_parse_named_and_extra_fields() {
        let (matter, body) = FrontMatter::parse(DOC).unwrap().unwrap();
        assert_eq!(matter.id.as_deref(), Some("7d9f3c2e-1b4a-4c8e-9f00-123456789abc"));
        assert_eq!(matter.slug.as_deref(), Some("my-post"));
        assert_eq!(matter.title.as_deref(), Some("My Post"));
        assert!(matter.extra.contains_key("tags"));
        assert_eq!(matter.extra["draft"], serde_yaml::Value::Bool(true));
        assert_eq!(body, "# Hello\n\nBody text.\n");
    }

    #[test]
    fn test_extra_fields_survive_roundtrip() {
        let (matter, _) = FrontMatter::parse(DOC).unwrap().unwrap();
        let block = matter.to_block().unwrap();
        let (again, body) = FrontMatter::parse(&block).unwrap().unwrap();
        assert_eq!(again, matter);
        assert!(body.is_empty());
    }

    #[test]
    fn test_numeric_id() {
        let (matter, _) = FrontMatter::parse("---\nid: 42\n---\n").unwrap().unwrap();
        assert_eq!(matter.id.as_deref(), Some("42"));
    }

    #[test]
    fn test_no_or_unterminated_frontmatter() {
        assert!(FrontMatter::parse("# Just a heading").unwrap().is_none());
        assert!(FrontMatter::parse("---\nid: x\nno closing fence").unwrap().is_none());
        let (matter, body) = FrontMatter::parse("---\r\n---\r\nbody").unwrap().unwrap();
        assert_eq!(matter, FrontMatter::default());
        assert_eq!(body, "body");
    }

    #[test]
    fn test_summary_prefers_heading() {
        assert_eq!(derive_summary(DOC, 100), "Hello");
        assert_eq!(derive_summary("intro\n## Section Two ##\n", 100), "Section Two");
    }

    #[test]
    fn test_summary_falls_back() {
        assert_eq!(derive_summary("---\ntitle: From Title\n---\nplain\n", 100), "From Title");
        assert_eq!(derive_summary("\n\n  first line  \nsecond", 100), "first line");
        assert_eq!(derive_summary("#hashtag only", 100), "#hashtag only");
        assert_eq!(derive_summary("", 100), "Untitled");
        assert_eq!(derive_summary("   \n", 100), "Untitled");
    }

    #[test]
    fn test_summary_truncates_on_char_boundary() {
        let long = format!("# {}", "é".repeat(150));
        let summary = derive_summary(&long, 100);
        assert_eq!(summary.chars().count(), 100);
        assert_eq!(derive_summary("# short", 100), "short");
    }
}
