//! # logos-history — Delta-compressed version history for Logos documents
//!
//! Keeps the last few revisions of each post or page as one JSON file per
//! document, storing a full base plus line-based deltas against the
//! preceding revision.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  type + identifier  ┌────────────────────┐
//! │ HistoryStore │ ──────────────────► │ IdentifierResolver │──► DocumentCorpus
//! └──────┬───────┘                     │ (sanitize, alias)  │    (id → slug)
//!        │                             └─────────┬──────────┘
//!        ▼                                       ▼
//! ┌──────────────┐   newest first      ┌────────────────────┐
//! │ VersionChain │ ◄─────────────────► │ history/<type>/    │
//! │ base ◄ Δ ◄ Δ │   HistoryFile       │   <key>.json       │
//! └──────┬───────┘                     └────────────────────┘
//!        │ truncate(10) + compact(5)
//!        ▼
//! ┌──────────────┐
//! │ create_delta │  Copy{offset,len} | Insert(text)
//! │ apply_delta  │
//! └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`store`] — Save / list / get / delete / clear / compare operations
//! - [`chain`] — Version arena, reconstruction and dependency-aware removal
//! - [`delta`] — Line-based delta creation and replay
//! - [`compact`] — Chain length bound
//! - [`legacy`] — Conversion of pre-delta snapshot arrays
//! - [`resolver`] — Identifier resolution and slug-to-id migration
//! - [`storage`] — Path confinement and the history file codec
//! - [`audit`] — Security event sinks
//! - [`frontmatter`] — Frontmatter parsing and summary derivation
//!
//! ## Limits
//!
//! | Setting | Default |
//! |---------|---------|
//! | Versions kept per document | 10 |
//! | Chain length that forces a new base | 5 |
//! | Summary length | 100 chars |
//! | Identifier length | 200 bytes |

pub mod audit;
pub mod chain;
pub mod compact;
pub mod config;
pub mod delta;
pub mod error;
pub mod frontmatter;
pub mod legacy;
pub mod resolver;
pub mod storage;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use audit::{AuditRing, NullSink, SecurityEvent, SecurityEventKind, SecuritySink};
pub use chain::{ReconstructError, Removal, VersionChain};
pub use compact::{compact_history, CompactionReport};
pub use config::HistoryConfig;
pub use delta::{apply_delta, create_delta, Delta, DeltaError, DeltaOp};
pub use error::{HistoryError, Result};
pub use legacy::{convert_to_delta_format, LegacyContext, LegacySnapshot};
pub use resolver::{DocumentCorpus, FsCorpus, IdentifierResolver, NoCorpus, Resolution};
pub use storage::{HistoryFile, HistoryPaths, IdentifierProblem};
pub use store::HistoryStore;
pub use types::{
    DeleteOutcome, DocumentType, HistoryStats, Payload, SaveOutcome, TextSize, VersionComparison,
    VersionContent, VersionEntry, VersionId, VersionInfo,
};
