//! Session context: one live journal bound to a save slot.

use crate::error::Result;
use crate::journal::Journal;
use crate::persist::{ExportDocument, ExportOptions, SaveBackend, SaveManager, SaveMeta};
use crate::subscriptions::{SubscriptionConfig, SubscriptionHandle};
use crate::types::{SlotId, StateBundle};
use std::sync::Arc;
use tracing::info;

/// The operations the surrounding application drives: completed turns,
/// rewinds, saves and exports.
pub struct Session<B: SaveBackend> {
    slot: SlotId,
    name: String,
    journal: Journal,
    saves: Arc<SaveManager<B>>,
}

impl<B: SaveBackend> Session<B> {
    /// Start a new, empty session that will save to `slot`.
    pub fn new(slot: SlotId, name: impl Into<String>, saves: Arc<SaveManager<B>>) -> Self {
        let journal = Journal::new(saves.journal_config().clone());
        Self {
            slot,
            name: name.into(),
            journal,
            saves,
        }
    }

    /// Resume the session stored in `slot`.
    pub fn open(slot: SlotId, saves: Arc<SaveManager<B>>) -> Result<Self> {
        let loaded = saves.load(&slot)?;
        Ok(Self {
            slot,
            name: loaded.meta.name,
            journal: loaded.journal,
            saves,
        })
    }

    /// Import an export into a new slot and open it.
    pub fn import(bytes: &[u8], saves: Arc<SaveManager<B>>) -> Result<Self> {
        let slot = saves.request_import(bytes)?;
        Self::open(slot, saves)
    }

    pub fn slot(&self) -> &SlotId {
        &self.slot
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Record the state at the end of the next turn and return its number.
    pub fn on_turn_completed(&mut self, bundle: StateBundle) -> Result<u64> {
        let turn = self.journal.last_turn().map_or(1, |last| last + 1);
        self.journal.append_bundle(turn, bundle)?;
        Ok(turn)
    }

    /// Rewind to `turn`: every later turn is discarded and the state at
    /// `turn` is returned for the application to resume from.
    ///
    /// Nothing is discarded if the state cannot be reconstructed.
    pub fn request_rewind(&mut self, turn: u64) -> Result<StateBundle> {
        let state = self.journal.get_state_at_turn(turn)?;
        let removed = self.journal.truncate_after(turn);
        info!(slot = %self.slot, turn, removed, "rewound session");
        Ok(state)
    }

    pub fn latest_state(&self) -> Result<Option<StateBundle>> {
        self.journal.get_latest_state()
    }

    pub fn save(&self) -> Result<SaveMeta> {
        self.saves.save(&self.slot, &self.name, &self.journal)
    }

    /// Export the live journal, including turns not yet saved.
    pub fn request_export(&self, optimized: bool) -> Result<Vec<u8>> {
        ExportDocument::from_journal(self.name.clone(), Some(self.slot.clone()), &self.journal)?
            .to_bytes(&ExportOptions::optimized(optimized))
    }

    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.journal.subscribe(config)
    }
}
