//! On-disk layer: path confinement and the history file format.
//!
//! ```text
//! ┌──────────────────┐  sanitized key  ┌───────────────────────────┐
//! │ IdentifierResolver│ ──────────────► │ HistoryPaths              │
//! └────────┬─────────┘                 │  root/<type>/<key>.json    │
//!          │                           │  symlink-escape check      │
//!          ▼                           └───────────────────────────┘
//! ┌──────────────────┐
//! │ HistoryFile       │  {schemaVersion:2, useDelta, entries[]}
//! │                   │  | [legacy snapshot, …]
//! └──────────────────┘  temp file + rename on every write
//! ```

pub mod file;
pub mod paths;

pub use file::{
    modified_at, read_history_file, remove_history_file, write_history_file, DeltaDocument,
    HistoryFile, SCHEMA_VERSION,
};
pub use paths::{sanitize_identifier, HistoryPaths, IdentifierProblem, PathError};
