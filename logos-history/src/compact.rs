//! Compaction: bound every entry's distance from its base.
//!
//! ```text
//! before (max = 2):  B ← Δ ← Δ ← Δ ← Δ ← Δ
//! depth:             0   1   2   3   4   5
//!
//! after:             B ← Δ ← B ← Δ ← B ← Δ
//! depth:             0   1   0   1   0   1
//! ```
//!
//! Entries are visited oldest first, so a predecessor's depth is always known
//! before its dependents. An entry whose depth reaches the bound is
//! rewritten in place as a base holding its reconstructed content.

use std::collections::HashMap;

use crate::chain::{ReconstructError, VersionChain};
use crate::types::VersionId;

/// What a compaction pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactionReport {
    /// Entries rewritten as bases, oldest first
    pub promoted: Vec<VersionId>,
    /// Longest chain remaining after the pass
    pub longest_chain: usize,
}

impl CompactionReport {
    pub fn is_noop(&self) -> bool {
        self.promoted.is_empty()
    }
}

/// Rewrite `chain` so every entry needs fewer than `max_chain_length` delta
/// applications (a bound of 0 acts as 1). Every id reconstructs to the same content afterwards.
pub fn compact_history(
    chain: &mut VersionChain,
    max_chain_length: usize,
) -> Result<CompactionReport, ReconstructError> {
    let bound = max_chain_length.max(1);
    let mut depths: HashMap<VersionId, usize> = HashMap::with_capacity(chain.len());
    let mut report = CompactionReport::default();
    let oldest_first: Vec<VersionId> = chain.ids().iter().rev().cloned().collect();

    for id in oldest_first {
        let Some(entry) = chain.get(&id) else {
            continue;
        };

        let mut depth = if entry.is_base() {
            0
        } else {
            match entry.based_on.as_ref().and_then(|parent| depths.get(parent)) {
                Some(parent_depth) => parent_depth + 1,
                None => chain.chain_length(&id)?,
            }
        };

        if depth >= bound {
            let content = chain.reconstruct_content(&id)?;
            if let Some(entry) = chain.get_mut(&id) {
                entry.promote_to_base(content);
            }
            log::debug!("Compaction promoted {id} to base (depth {depth})");
            report.promoted.push(id.clone());
            depth = 0;
        }

        report.longest_chain = report.longest_chain.max(depth);
        depths.insert(id, depth);
    }

    Ok(report)
}
