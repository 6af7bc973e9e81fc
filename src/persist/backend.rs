//! Storage backend contract and the in-memory backend.

use crate::error::Result;
use crate::history::TurnHistoryEntry;
use crate::types::{SlotId, Timestamp};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// What a backend stores per slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredSave {
    pub name: String,
    pub timestamp: Timestamp,
    pub app_version: String,
    /// History in storage form (see `compact_for_storage`).
    pub compacted_state_history: Vec<TurnHistoryEntry>,
    /// Message log at the latest turn, for previews without replay.
    #[serde(default)]
    pub current_messages: Vec<Value>,
}

impl StoredSave {
    pub fn meta(&self, slot: &SlotId) -> SaveMeta {
        SaveMeta {
            slot: slot.clone(),
            name: self.name.clone(),
            timestamp: self.timestamp,
            app_version: self.app_version.clone(),
            turn_count: self.compacted_state_history.len(),
            latest_turn: self
                .compacted_state_history
                .iter()
                .map(TurnHistoryEntry::turn)
                .max(),
        }
    }
}

/// Listing information for a slot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaveMeta {
    pub slot: SlotId,
    pub name: String,
    pub timestamp: Timestamp,
    pub app_version: String,
    pub turn_count: usize,
    pub latest_turn: Option<u64>,
}

/// Opaque key-value storage for saves.
///
/// Implementations need not serialize writers themselves; `SaveManager`
/// holds a per-slot lock around every write.
pub trait SaveBackend: Send + Sync {
    fn get(&self, slot: &SlotId) -> Result<Option<StoredSave>>;

    fn put(&self, slot: &SlotId, save: StoredSave) -> Result<SlotId>;

    /// Removing an absent slot is not an error.
    fn delete(&self, slot: &SlotId) -> Result<()>;

    fn list(&self) -> Result<Vec<SaveMeta>>;
}

/// Process-local backend, mainly for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryBackend {
    saves: RwLock<HashMap<SlotId, StoredSave>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.saves.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.saves.read().is_empty()
    }
}

impl SaveBackend for MemoryBackend {
    fn get(&self, slot: &SlotId) -> Result<Option<StoredSave>> {
        Ok(self.saves.read().get(slot).cloned())
    }

    fn put(&self, slot: &SlotId, save: StoredSave) -> Result<SlotId> {
        self.saves.write().insert(slot.clone(), save);
        Ok(slot.clone())
    }

    fn delete(&self, slot: &SlotId) -> Result<()> {
        self.saves.write().remove(slot);
        Ok(())
    }

    fn list(&self) -> Result<Vec<SaveMeta>> {
        let mut metas: Vec<SaveMeta> = self
            .saves
            .read()
            .iter()
            .map(|(slot, save)| save.meta(slot))
            .collect();
        metas.sort_by(|a, b| a.slot.cmp(&b.slot));
        Ok(metas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StateBundle, APP_VERSION};

    fn save(name: &str) -> StoredSave {
        StoredSave {
            name: name.to_string(),
            timestamp: Timestamp::now(),
            app_version: APP_VERSION.to_string(),
            compacted_state_history: vec![TurnHistoryEntry::Keyframe {
                turn: 1,
                snapshot: StateBundle::empty(),
            }],
            current_messages: vec![],
        }
    }

    #[test]
    fn test_memory_backend_crud() {
        let backend = MemoryBackend::new();
        let slot = SlotId::from("alpha");

        assert!(backend.get(&slot).unwrap().is_none());
        assert_eq!(backend.put(&slot, save("Alpha")).unwrap(), slot);
        assert_eq!(backend.get(&slot).unwrap().unwrap().name, "Alpha");

        backend.put(&SlotId::from("beta"), save("Beta")).unwrap();
        let metas = backend.list().unwrap();
        assert_eq!(metas.len(), 2);
        assert_eq!(metas[0].slot, slot);
        assert_eq!(metas[0].latest_turn, Some(1));

        backend.delete(&slot).unwrap();
        backend.delete(&slot).unwrap();
        assert_eq!(backend.len(), 1);
    }
}
