//! # Turn Journal
//!
//! A turn-indexed journal for large, frequently mutated session state: a
//! knowledge base document plus an ordered message log, recorded once per
//! completed turn without storing a full copy every time.
//!
//! ## Core Concepts
//!
//! - **Keyframes**: full snapshots, stored every `K` turns or when a delta
//!   would be too large
//! - **Deltas**: JSON patches against the previous turn
//! - **Reconstruction**: nearest keyframe at or before a turn, then replay
//! - **Rewind**: truncate the timeline; later turns are discarded, not forked
//! - **Persistence**: compacted histories for storage, fully expanded
//!   histories for portable export
//!
//! ## Example
//!
//! ```ignore
//! use turn_journal::{Journal, JournalConfig};
//! use serde_json::json;
//!
//! let mut journal = Journal::new(JournalConfig::with_interval(5));
//!
//! for turn in 1..=12 {
//!     journal.append(turn, json!({ "counter": turn }), vec![])?;
//! }
//! assert_eq!(journal.keyframe_turns(), vec![1, 6, 11]);
//!
//! // Rewind
//! let state = journal.get_state_at_turn(9)?;
//! journal.truncate_after(9);
//! ```

pub mod error;
pub mod history;
pub mod journal;
pub mod patch;
pub mod persist;
pub mod session;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use error::{JournalError, Result};
pub use history::{
    EntryKind, KeyframeDecision, KeyframePolicy, KeyframeReason, RecoveryKind, RecoveryWarning,
    TurnHistoryEntry,
};
pub use journal::{Journal, JournalConfig, JournalStats, Reconstruction};
pub use patch::{apply_patch, apply_to_sequence, diff, diff_sequences, Patch, PatchOperation};
pub use persist::{
    compact_for_storage, expand_for_export, ExpandedHistory, ExportDocument, ExportOptions,
    FileBackend, FileBackendConfig, ImportedJournal, LoadedSave, MemoryBackend, SaveBackend,
    SaveManager, SaveMeta, SessionMeta, StoredSave,
};
pub use session::Session;
pub use subscriptions::{
    DropReason, JournalEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId, SubscriptionManager,
};
pub use types::*;
