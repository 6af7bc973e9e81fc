//! Save manager: compaction, slot locking and import/export on top of a
//! storage backend.

use super::backend::{SaveBackend, SaveMeta, StoredSave};
use super::compact::compact_for_storage;
use super::export::{ExportDocument, ExportOptions};
use crate::error::{JournalError, Result};
use crate::history::RecoveryWarning;
use crate::journal::{Journal, JournalConfig};
use crate::types::{Hash, SlotId, Timestamp, APP_VERSION};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A journal rebuilt from a stored slot.
pub struct LoadedSave {
    pub journal: Journal,
    pub meta: SaveMeta,
    /// Turns that needed recovery when the history was replayed.
    pub warnings: Vec<RecoveryWarning>,
}

/// Owns a backend and serializes writes per slot.
pub struct SaveManager<B: SaveBackend> {
    backend: B,
    journal_config: JournalConfig,

    /// One lock per slot touched so far.
    slot_locks: Mutex<HashMap<SlotId, Arc<Mutex<()>>>>,

    /// Held while an import picks its slot id and writes it.
    import_lock: Mutex<()>,
}

impl<B: SaveBackend> SaveManager<B> {
    pub fn new(backend: B, journal_config: JournalConfig) -> Self {
        Self {
            backend,
            journal_config,
            slot_locks: Mutex::new(HashMap::new()),
            import_lock: Mutex::new(()),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Configuration applied to journals this manager loads or imports.
    pub fn journal_config(&self) -> &JournalConfig {
        &self.journal_config
    }

    // --- Slot operations ---

    /// Compact `journal` and write it to `slot`.
    pub fn save(&self, slot: &SlotId, name: &str, journal: &Journal) -> Result<SaveMeta> {
        let lock = self.slot_lock(slot);
        let _guard = lock.lock();
        self.write_locked(slot, name, journal)
    }

    /// Read `slot` and rebuild its journal.
    ///
    /// Corrupt regions do not fail the load; they are reported in
    /// `warnings` and surface again if the affected turns are queried.
    pub fn load(&self, slot: &SlotId) -> Result<LoadedSave> {
        let stored = self
            .backend
            .get(slot)?
            .ok_or_else(|| JournalError::SlotNotFound(slot.clone()))?;

        let meta = stored.meta(slot);
        let journal =
            Journal::from_entries(self.journal_config.clone(), stored.compacted_state_history)?;
        let warnings = journal.verify();

        if warnings.is_empty() {
            debug!(%slot, turns = journal.len(), "loaded save");
        } else {
            warn!(%slot, warnings = warnings.len(), "loaded save with recovered turns");
        }

        Ok(LoadedSave {
            journal,
            meta,
            warnings,
        })
    }

    pub fn delete(&self, slot: &SlotId) -> Result<()> {
        let lock = self.slot_lock(slot);
        {
            let _guard = lock.lock();
            self.backend.delete(slot)?;
        }
        drop(lock);

        // Only forget the lock once no other caller holds or waits on it.
        let mut locks = self.slot_locks.lock();
        if locks.get(slot).map_or(false, |l| Arc::strong_count(l) == 1) {
            locks.remove(slot);
        }

        debug!(%slot, "deleted save");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<SaveMeta>> {
        self.backend.list()
    }

    // --- Import / export ---

    /// Export a stored slot. `optimized` selects zstd compression; the
    /// history is always fully expanded.
    pub fn request_export(&self, slot: &SlotId, optimized: bool) -> Result<Vec<u8>> {
        let stored = self
            .backend
            .get(slot)?
            .ok_or_else(|| JournalError::SlotNotFound(slot.clone()))?;
        let journal =
            Journal::from_entries(self.journal_config.clone(), stored.compacted_state_history)?;

        let doc = ExportDocument::from_journal(stored.name, Some(slot.clone()), &journal)?;
        let bytes = doc.to_bytes(&ExportOptions::optimized(optimized))?;
        info!(%slot, optimized, bytes = bytes.len(), "exported save");
        Ok(bytes)
    }

    /// Import an export document into a new slot and return its id.
    pub fn request_import(&self, bytes: &[u8]) -> Result<SlotId> {
        let doc = ExportDocument::from_bytes(bytes)?;
        let name = doc.session.name.clone();
        let imported = doc.into_journal(self.journal_config.clone())?;

        let base = format!("import-{}", Hash::from_bytes(bytes).short_hex());

        let _import_guard = self.import_lock.lock();
        let mut slot = SlotId::new(base.clone());
        let mut suffix = 2u32;
        while self.backend.get(&slot)?.is_some() {
            slot = SlotId::new(format!("{}-{}", base, suffix));
            suffix += 1;
        }

        let lock = self.slot_lock(&slot);
        let _guard = lock.lock();
        self.write_locked(&slot, &name, &imported.journal)?;

        info!(
            %slot,
            turns = imported.journal.len(),
            promoted = imported.promoted.len(),
            warnings = imported.warnings.len(),
            "imported save"
        );
        Ok(slot)
    }

    // --- Private Helpers ---

    fn slot_lock(&self, slot: &SlotId) -> Arc<Mutex<()>> {
        self.slot_locks
            .lock()
            .entry(slot.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Caller holds the slot lock.
    fn write_locked(&self, slot: &SlotId, name: &str, journal: &Journal) -> Result<SaveMeta> {
        let current_messages = match journal.get_latest_state() {
            Ok(state) => state.map(|s| s.messages).unwrap_or_default(),
            Err(err) => {
                warn!(%slot, error = %err, "latest state unavailable, saving without messages");
                Vec::new()
            }
        };

        let save = StoredSave {
            name: name.to_string(),
            timestamp: Timestamp::now(),
            app_version: APP_VERSION.to_string(),
            compacted_state_history: compact_for_storage(journal.entries()),
            current_messages,
        };
        let meta = save.meta(slot);

        self.backend
            .put(slot, save)
            .map_err(|err| JournalError::StorageWrite {
                slot: slot.clone(),
                reason: err.to_string(),
            })?;

        debug!(%slot, turns = meta.turn_count, "saved journal");
        Ok(meta)
    }
}
