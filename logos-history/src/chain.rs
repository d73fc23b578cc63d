//! Version chain: id-keyed entry arena plus a recency index.
//!
//! ```text
//!   order (newest first)        entries (by id)
//!   ┌────┬────┬────┬────┐       ┌──────────────────────────────┐
//!   │ v4 │ v3 │ v2 │ v1 │       │ v4: Δ(v3)   v3: Δ(v2)        │
//!   └────┴────┴────┴────┘       │ v2: Δ(v1)   v1: BASE "..."   │
//!                               └──────────────────────────────┘
//!   reconstruct(v4) = BASE(v1) → Δv2 → Δv3 → Δv4
//! ```
//!
//! Each delta entry names its predecessor (`based_on`), so reconstruction and
//! removal follow explicit links instead of list position. The recency index
//! only decides what is "head" and which entries are evicted first.

use std::collections::{HashMap, HashSet};

use crate::delta::{apply_delta, create_delta, DeltaError};
use crate::types::{Payload, VersionEntry, VersionId};

/// Chain walking errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconstructError {
    /// Requested id is not in the chain
    #[error("version {0} is not retained")]
    UnknownVersion(VersionId),
    /// A delta names a predecessor that is no longer retained
    #[error("version {from} is based on {missing}, which is not retained")]
    DanglingReference { from: VersionId, missing: VersionId },
    /// A delta entry has no predecessor at all
    #[error("version {0} is a delta with no predecessor")]
    MissingBase(VersionId),
    /// Predecessor links loop back on themselves
    #[error("predecessor links form a cycle at version {0}")]
    Cycle(VersionId),
    /// A delta failed to replay
    #[error("delta of version {id} does not apply: {source}")]
    Patch {
        id: VersionId,
        #[source]
        source: DeltaError,
    },
}

/// Result of removing an entry from the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub removed: VersionEntry,
    /// Dependents rewritten as bases
    pub promoted: Vec<VersionId>,
    /// Dependents re-diffed against the removed entry's predecessor
    pub rebased: Vec<VersionId>,
}

/// Ordered, id-addressable history of one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionChain {
    entries: HashMap<VersionId, VersionEntry>,
    /// Newest first
    order: Vec<VersionId>,
}

impl VersionChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a newest-first entry list.
    ///
    /// Delta entries without an explicit predecessor are linked to the next
    /// older entry. Repeated ids keep the newest occurrence.
    pub fn from_entries(entries: Vec<VersionEntry>) -> Self {
        let positional: Vec<Option<VersionId>> = entries
            .iter()
            .skip(1)
            .map(|e| Some(e.id.clone()))
            .chain(std::iter::once(None))
            .collect();

        let mut chain = Self::new();
        for (mut entry, older) in entries.into_iter().zip(positional) {
            if chain.entries.contains_key(&entry.id) {
                log::warn!("Dropping duplicate history entry {}", entry.id);
                continue;
            }
            if !entry.is_base() && entry.based_on.is_none() {
                entry.based_on = older;
            }
            chain.order.push(entry.id.clone());
            chain.entries.insert(entry.id.clone(), entry);
        }
        chain
    }

    /// Consume into a newest-first entry list.
    pub fn into_entries(mut self) -> Vec<VersionEntry> {
        self.order
            .iter()
            .filter_map(|id| self.entries.remove(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &VersionId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &VersionId) -> Option<&VersionEntry> {
        self.entries.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &VersionId) -> Option<&mut VersionEntry> {
        self.entries.get_mut(id)
    }

    /// Current head (newest entry).
    pub fn head(&self) -> Option<&VersionEntry> {
        self.order.first().and_then(|id| self.entries.get(id))
    }

    /// Oldest retained entry.
    pub fn oldest(&self) -> Option<&VersionEntry> {
        self.order.last().and_then(|id| self.entries.get(id))
    }

    /// Ids, newest first.
    pub fn ids(&self) -> &[VersionId] {
        &self.order
    }

    /// Entries, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &VersionEntry> {
        self.order.iter().filter_map(|id| self.entries.get(id))
    }

    /// Entries whose delta was computed against `id`.
    pub fn dependents(&self, id: &VersionId) -> Vec<VersionId> {
        self.order
            .iter()
            .rev()
            .filter(|dep| {
                self.entries
                    .get(*dep)
                    .is_some_and(|e| e.based_on.as_ref() == Some(id))
            })
            .cloned()
            .collect()
    }

    /// Make `entry` the new head.
    pub fn push_head(&mut self, entry: VersionEntry) {
        if self.entries.contains_key(&entry.id) {
            self.order.retain(|id| *id != entry.id);
        }
        self.order.insert(0, entry.id.clone());
        self.entries.insert(entry.id.clone(), entry);
    }

    /// Ids from `id` back to its governing base, target first.
    fn walk(&self, id: &VersionId) -> Result<Vec<&VersionEntry>, ReconstructError> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = self
            .entries
            .get(id)
            .ok_or_else(|| ReconstructError::UnknownVersion(id.clone()))?;

        loop {
            if !seen.insert(&current.id) {
                return Err(ReconstructError::Cycle(current.id.clone()));
            }
            path.push(current);
            if current.is_base() {
                return Ok(path);
            }
            let parent = current
                .based_on
                .as_ref()
                .ok_or_else(|| ReconstructError::MissingBase(current.id.clone()))?;
            current = self
                .entries
                .get(parent)
                .ok_or_else(|| ReconstructError::DanglingReference {
                    from: current.id.clone(),
                    missing: parent.clone(),
                })?;
        }
    }

    /// Number of delta applications needed to rebuild `id`.
    pub fn chain_length(&self, id: &VersionId) -> Result<usize, ReconstructError> {
        Ok(self.walk(id)?.len() - 1)
    }

    /// Rebuild the full content of `id`.
    ///
    /// Deltas are replayed from the base forward, in the order they were
    /// created, since each was computed against its predecessor's content.
    pub fn reconstruct_content(&self, id: &VersionId) -> Result<String, ReconstructError> {
        let path = self.walk(id)?;
        let mut steps = path.into_iter().rev();

        let mut content = match steps.next().map(|e| &e.payload) {
            Some(Payload::Base(content)) => content.clone(),
            _ => return Err(ReconstructError::MissingBase(id.clone())),
        };
        for entry in steps {
            if let Payload::Delta(delta) = &entry.payload {
                content = apply_delta(&content, delta).map_err(|source| {
                    ReconstructError::Patch {
                        id: entry.id.clone(),
                        source,
                    }
                })?;
            }
        }
        Ok(content)
    }

    /// Remove `id`, keeping every other entry reconstructable.
    ///
    /// Dependents of a removed base become bases; dependents of a removed
    /// delta are re-diffed against the removed entry's own predecessor.
    pub fn remove(&mut self, id: &VersionId) -> Result<Removal, ReconstructError> {
        let target = self
            .entries
            .get(id)
            .ok_or_else(|| ReconstructError::UnknownVersion(id.clone()))?;
        let target_parent = target.based_on.clone();
        let target_is_base = target.is_base();

        let dependents = self.dependents(id);
        let parent_content = match (&target_parent, dependents.is_empty()) {
            (Some(parent), false) => Some(self.reconstruct_content(parent)?),
            _ => None,
        };

        let mut rewrites = Vec::with_capacity(dependents.len());
        for dep in &dependents {
            let content = self.reconstruct_content(dep)?;
            let payload = match (&parent_content, target_is_base) {
                (Some(parent), false) => Payload::Delta(create_delta(parent, &content)),
                _ => Payload::Base(content),
            };
            rewrites.push((dep.clone(), payload));
        }

        let mut promoted = Vec::new();
        let mut rebased = Vec::new();
        for (dep, payload) in rewrites {
            if let Some(entry) = self.entries.get_mut(&dep) {
                match payload {
                    Payload::Base(content) => {
                        entry.promote_to_base(content);
                        promoted.push(dep);
                    }
                    Payload::Delta(delta) => {
                        entry.payload = Payload::Delta(delta);
                        entry.based_on = target_parent.clone();
                        rebased.push(dep);
                    }
                }
            }
        }

        self.order.retain(|o| o != id);
        let removed = self
            .entries
            .remove(id)
            .ok_or_else(|| ReconstructError::UnknownVersion(id.clone()))?;

        Ok(Removal {
            removed,
            promoted,
            rebased,
        })
    }

    /// Evict oldest entries until at most `max` remain.
    pub fn truncate(&mut self, max: usize) -> Result<Vec<VersionId>, ReconstructError> {
        let mut evicted = Vec::new();
        while self.order.len() > max {
            let Some(oldest) = self.order.last().cloned() else {
                break;
            };
            self.remove(&oldest)?;
            evicted.push(oldest);
        }
        Ok(evicted)
    }
}
