//! Delta engine: exact, replayable patches between two full texts.
//!
//! Architecture:
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                    create_delta                       │
//! │                                                       │
//! │  old ──lines──┐                                       │
//! │               ├── Myers diff ── Equal   → Copy(range) │
//! │  new ──lines──┘                 Insert  → Insert(txt) │
//! │                                 Replace → Copy prefix │
//! │                                           Insert mid  │
//! │                                           Copy suffix │
//! │                                 Delete  → (skip)      │
//! └───────────────────────────────────────────────────────┘
//!
//! apply_delta(old, delta) == new   (byte-for-byte)
//! ```
//!
//! A delta is a list of copy ranges into the source text and literal
//! insertions, plus the expected source and target byte lengths so a patch
//! replayed against the wrong text is rejected instead of producing garbage.
//!
//! Line-level diffing keeps deltas small for prose edits; replaced line runs
//! are trimmed to their common prefix/suffix so a one-word change inside a
//! long paragraph only stores the changed middle.

use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffTag};

/// Fixed overhead charged per copy op when estimating stored size.
const COPY_OP_BYTES: usize = 16;

/// One patch operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOp {
    /// Copy `len` bytes of the source starting at byte `offset`
    Copy { offset: usize, len: usize },
    /// Emit literal text
    Insert(String),
}

/// A patch turning one full text into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    /// Byte length of the text this delta applies to
    pub source_len: usize,
    /// Byte length of the text it produces
    pub target_len: usize,
    pub ops: Vec<DeltaOp>,
}

impl Delta {
    /// Bytes of literal text carried by this delta.
    pub fn inserted_bytes(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                DeltaOp::Insert(text) => text.len(),
                DeltaOp::Copy { .. } => 0,
            })
            .sum()
    }

    /// Approximate persisted size: inserted text plus a fixed cost per copy.
    pub fn payload_bytes(&self) -> usize {
        self.ops
            .iter()
            .map(|op| match op {
                DeltaOp::Insert(text) => text.len(),
                DeltaOp::Copy { .. } => COPY_OP_BYTES,
            })
            .sum()
    }

    /// True when applying this delta returns the source unchanged.
    pub fn is_identity(&self) -> bool {
        match self.ops.as_slice() {
            [] => self.source_len == 0 && self.target_len == 0,
            [DeltaOp::Copy { offset: 0, len }] => {
                *len == self.source_len && *len == self.target_len
            }
            _ => false,
        }
    }
}

/// Delta replay errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeltaError {
    /// Delta was computed against a text of a different length
    #[error("Source length mismatch: delta expects {expected} bytes, got {actual}")]
    SourceLengthMismatch { expected: usize, actual: usize },
    /// Copy range falls outside the source or splits a UTF-8 sequence
    #[error("Copy of {len} bytes at offset {offset} is invalid for a {source_len}-byte source")]
    InvalidCopy {
        offset: usize,
        len: usize,
        source_len: usize,
    },
    /// Replay produced text of the wrong length
    #[error("Target length mismatch: delta promises {expected} bytes, produced {actual}")]
    TargetLengthMismatch { expected: usize, actual: usize },
}

/// Compute a delta that turns `old` into `new`.
pub fn create_delta(old: &str, new: &str) -> Delta {
    let old_lines: Vec<&str> = old.split_inclusive('\n').collect();
    let new_lines: Vec<&str> = new.split_inclusive('\n').collect();

    // old_offsets[i] = byte offset of line i; last element = old.len()
    let old_offsets = line_offsets(&old_lines);
    let new_offsets = line_offsets(&new_lines);

    let mut builder = OpBuilder::default();
    for op in similar::capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines) {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        let old_start = old_offsets[old_range.start];
        let old_end = old_offsets[old_range.end];
        let new_start = new_offsets[new_range.start];
        let new_end = new_offsets[new_range.end];

        match tag {
            DiffTag::Equal => builder.copy(old_start, old_end - old_start),
            DiffTag::Delete => {}
            DiffTag::Insert => builder.insert(&new[new_start..new_end]),
            DiffTag::Replace => {
                let old_seg = &old[old_start..old_end];
                let new_seg = &new[new_start..new_end];
                let (prefix, suffix) = common_affixes(old_seg, new_seg);
                builder.copy(old_start, prefix);
                builder.insert(&new_seg[prefix..new_seg.len() - suffix]);
                builder.copy(old_end - suffix, suffix);
            }
        }
    }

    Delta {
        source_len: old.len(),
        target_len: new.len(),
        ops: builder.finish(),
    }
}

/// Apply `delta` to `source`, reproducing the text it was computed for.
pub fn apply_delta(source: &str, delta: &Delta) -> Result<String, DeltaError> {
    if source.len() != delta.source_len {
        return Err(DeltaError::SourceLengthMismatch {
            expected: delta.source_len,
            actual: source.len(),
        });
    }

    let mut out = String::with_capacity(delta.target_len);
    for op in &delta.ops {
        match op {
            DeltaOp::Copy { offset, len } => {
                let slice = offset
                    .checked_add(*len)
                    .and_then(|end| source.get(*offset..end))
                    .ok_or(DeltaError::InvalidCopy {
                        offset: *offset,
                        len: *len,
                        source_len: source.len(),
                    })?;
                out.push_str(slice);
            }
            DeltaOp::Insert(text) => out.push_str(text),
        }
    }

    if out.len() != delta.target_len {
        return Err(DeltaError::TargetLengthMismatch {
            expected: delta.target_len,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Prefix sums of line byte lengths.
fn line_offsets(lines: &[&str]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(lines.len() + 1);
    let mut acc = 0;
    offsets.push(0);
    for line in lines {
        acc += line.len();
        offsets.push(acc);
    }
    offsets
}

/// Byte lengths of the longest common prefix and (non-overlapping) suffix,
/// both ending on char boundaries.
fn common_affixes(a: &str, b: &str) -> (usize, usize) {
    let prefix: usize = a
        .chars()
        .zip(b.chars())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .sum();

    let max_suffix = (a.len() - prefix).min(b.len() - prefix);
    let suffix: usize = a[prefix..]
        .chars()
        .rev()
        .zip(b[prefix..].chars().rev())
        .take_while(|(x, y)| x == y)
        .map(|(c, _)| c.len_utf8())
        .scan(0usize, |total, len| {
            *total += len;
            (*total <= max_suffix).then_some(len)
        })
        .sum();

    (prefix, suffix)
}

/// Accumulates ops, merging contiguous copies and adjacent inserts.
#[derive(Default)]
struct OpBuilder {
    ops: Vec<DeltaOp>,
}

impl OpBuilder {
    fn copy(&mut self, offset: usize, len: usize) {
        if len == 0 {
            return;
        }
        if let Some(DeltaOp::Copy {
            offset: prev_offset,
            len: prev_len,
        }) = self.ops.last_mut()
        {
            if *prev_offset + *prev_len == offset {
                *prev_len += len;
                return;
            }
        }
        self.ops.push(DeltaOp::Copy { offset, len });
    }

    fn insert(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(DeltaOp::Insert(prev)) = self.ops.last_mut() {
            prev.push_str(text);
            return;
        }
        self.ops.push(DeltaOp::Insert(text.to_string()));
    }

    fn finish(self) -> Vec<DeltaOp> {
        self.ops
    }
}
