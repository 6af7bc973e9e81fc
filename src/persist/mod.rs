//! Persistence adapter.
//!
//! Moves journal histories between three representations:
//!
//! - **In memory**: the journal's own entries.
//! - **Storage form**: keyframes with snapshots, deltas with patches only
//!   (`compact_for_storage`). This is what backends hold.
//! - **Portable form**: every entry carries a full snapshot
//!   (`expand_for_export`). This is what export documents hold.
//!
//! Neither transform changes what any turn resolves to.

mod backend;
mod compact;
mod export;
mod file_backend;
mod manager;

pub use backend::{MemoryBackend, SaveBackend, SaveMeta, StoredSave};
pub use compact::{compact_for_storage, expand_for_export, ExpandedHistory};
pub use export::{
    normalize_imported, ExportDocument, ExportOptions, ImportedJournal, SessionMeta,
    EXPORT_FORMAT_VERSION,
};
pub use file_backend::{FileBackend, FileBackendConfig};
pub use manager::{LoadedSave, SaveManager};
