//! The turn-indexed journal.

use crate::error::{JournalError, Result};
use crate::history::{
    EntryKind, KeyframeDecision, KeyframePolicy, KeyframeReason, RecoveryWarning, ReplayCursor,
    TurnHistoryEntry, DEFAULT_MIN_OVERRIDE_BYTES,
};
use crate::patch::{diff, diff_sequences};
use crate::subscriptions::{
    JournalEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionManager,
};
use crate::types::StateBundle;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::num::NonZeroUsize;
use tracing::{debug, warn};

/// Journal configuration.
#[derive(Clone, Debug)]
pub struct JournalConfig {
    /// Keyframe interval `K`: at most `K - 1` deltas follow a keyframe.
    pub keyframe_interval: u64,

    /// A delta larger than `size_threshold` times the last keyframe's size
    /// is stored as a keyframe instead.
    pub size_threshold: f64,

    /// Deltas below this size never trigger the size override.
    pub min_override_bytes: usize,

    /// Number of reconstructed turns kept in memory.
    pub reconstruction_cache_size: usize,

    /// Retention: keep at most this many keyframes (and their deltas).
    /// `None` keeps everything.
    pub max_keyframes: Option<usize>,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            keyframe_interval: 10,
            size_threshold: 1.0,
            min_override_bytes: DEFAULT_MIN_OVERRIDE_BYTES,
            reconstruction_cache_size: 32,
            max_keyframes: None,
        }
    }
}

impl JournalConfig {
    /// Default configuration with a specific keyframe interval.
    pub fn with_interval(keyframe_interval: u64) -> Self {
        Self {
            keyframe_interval,
            ..Default::default()
        }
    }
}

/// Entry counts and serialized sizes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct JournalStats {
    pub entry_count: usize,
    pub keyframe_count: usize,
    pub delta_count: usize,
    pub keyframe_bytes: u64,
    pub delta_bytes: u64,
}

/// A reconstructed state plus any recovery that was needed to produce it.
#[derive(Clone, Debug)]
pub struct Reconstruction {
    pub state: StateBundle,
    pub warnings: Vec<RecoveryWarning>,
}

impl Reconstruction {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Ordered list of turn entries plus the caches that make queries cheap.
///
/// The journal is the only owner of its entries. Mutation (`append`,
/// `truncate_after`, `clear`) takes `&mut self`; queries take `&self` and
/// fill caches behind locks.
pub struct Journal {
    config: JournalConfig,
    policy: KeyframePolicy,

    /// Entries sorted by turn.
    entries: Vec<TurnHistoryEntry>,

    /// Positions of keyframes in `entries`, ascending.
    keyframes: Vec<usize>,

    /// Serialized size of the most recent keyframe snapshot.
    last_keyframe_size: usize,

    /// State at the last turn. `None` means stale, rebuilt on demand.
    latest: RwLock<Option<StateBundle>>,

    /// Recently reconstructed turns.
    recent: Mutex<LruCache<u64, StateBundle>>,

    subscriptions: SubscriptionManager,
}

impl Journal {
    /// Create an empty journal.
    pub fn new(config: JournalConfig) -> Self {
        let policy = KeyframePolicy::new(config.keyframe_interval, config.size_threshold)
            .with_min_override_bytes(config.min_override_bytes);
        let cache_size = NonZeroUsize::new(config.reconstruction_cache_size.max(1))
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            config,
            policy,
            entries: Vec::new(),
            keyframes: Vec::new(),
            last_keyframe_size: 0,
            latest: RwLock::new(None),
            recent: Mutex::new(LruCache::new(cache_size)),
            subscriptions: SubscriptionManager::new(),
        }
    }

    /// Build a journal from loaded or imported entries.
    ///
    /// Entries are sorted by turn. Duplicate turns are rejected. Gaps and a
    /// missing leading keyframe are accepted here and surface as
    /// `MissingKeyframe` when the affected turns are reconstructed.
    pub fn from_entries(config: JournalConfig, mut entries: Vec<TurnHistoryEntry>) -> Result<Self> {
        entries.sort_by_key(TurnHistoryEntry::turn);
        if let Some(pair) = entries.windows(2).find(|w| w[0].turn() == w[1].turn()) {
            return Err(JournalError::InvalidOperation(format!(
                "duplicate entries for turn {}",
                pair[0].turn()
            )));
        }

        let mut journal = Self::new(config);
        journal.entries = entries;
        journal.reindex();

        if journal.entries.first().is_some_and(|e| !e.is_keyframe()) {
            warn!(
                first_turn = ?journal.first_turn(),
                "loaded history does not start with a keyframe"
            );
        }
        Ok(journal)
    }

    pub fn config(&self) -> &JournalConfig {
        &self.config
    }

    pub fn policy(&self) -> &KeyframePolicy {
        &self.policy
    }

    // --- Journal operations ---

    /// Record the state at the end of `turn`.
    ///
    /// `turn` must be exactly one past the last stored turn. An empty
    /// journal accepts turn 0 or 1.
    pub fn append(
        &mut self,
        turn: u64,
        knowledge_base: Value,
        messages: Vec<Value>,
    ) -> Result<&TurnHistoryEntry> {
        self.append_bundle(turn, StateBundle::new(knowledge_base, messages))
    }

    /// Same as [`append`](Self::append) with a prebuilt bundle.
    pub fn append_bundle(&mut self, turn: u64, bundle: StateBundle) -> Result<&TurnHistoryEntry> {
        match self.last_turn() {
            Some(last) if turn != last + 1 => {
                return Err(JournalError::OutOfOrderTurn {
                    expected: last + 1,
                    got: turn,
                })
            }
            None if turn > 1 => {
                return Err(JournalError::OutOfOrderTurn {
                    expected: 1,
                    got: turn,
                })
            }
            _ => {}
        }

        let last_keyframe_turn = self.last_keyframe_turn();
        let mut decision = self
            .policy
            .decide(turn, last_keyframe_turn, None, self.last_keyframe_size);

        let mut delta = None;
        if !decision.is_keyframe() {
            match self.latest_for_append() {
                Some(prev) => {
                    let kb_patch = diff(&prev.knowledge_base, &bundle.knowledge_base);
                    let messages_patch = diff_sequences(&prev.messages, &bundle.messages);
                    let size = kb_patch.encoded_len() + messages_patch.encoded_len();
                    decision = self.policy.decide(
                        turn,
                        last_keyframe_turn,
                        Some(size),
                        self.last_keyframe_size,
                    );
                    delta = Some((kb_patch, messages_patch));
                }
                None => {
                    warn!(turn, "previous state unavailable, rebasing with a keyframe");
                    decision = KeyframeDecision::Keyframe(KeyframeReason::Rebase);
                }
            }
        }

        let entry = match (decision, delta) {
            (KeyframeDecision::Delta, Some((kb_patch, messages_patch))) => {
                TurnHistoryEntry::delta(turn, kb_patch, messages_patch)
            }
            (decision, _) => {
                self.last_keyframe_size = bundle.encoded_len();
                debug!(turn, ?decision, size = self.last_keyframe_size, "keyframe");
                TurnHistoryEntry::Keyframe {
                    turn,
                    snapshot: bundle.clone(),
                }
            }
        };

        let kind = entry.kind();
        if kind == EntryKind::Keyframe {
            self.keyframes.push(self.entries.len());
        }
        self.entries.push(entry);
        *self.latest.write() = Some(bundle);

        self.subscriptions
            .broadcast(JournalEvent::Appended { turn, kind });
        self.apply_retention();

        let last = self.entries.len() - 1;
        Ok(&self.entries[last])
    }

    /// State at `turn`. Equivalent to [`get_state_at_turn`](Self::get_state_at_turn).
    pub fn reconstruct(&self, turn: u64) -> Result<StateBundle> {
        self.get_state_at_turn(turn)
    }

    /// Discard every entry after `turn`. Returns the number removed.
    ///
    /// Further appends continue from `turn + 1`; the discarded timeline is
    /// gone. Truncating before the first entry empties the journal.
    pub fn truncate_after(&mut self, turn: u64) -> usize {
        let keep = self.entries.partition_point(|e| e.turn() <= turn);
        let removed = self.entries.len() - keep;
        if removed == 0 {
            return 0;
        }

        self.entries.truncate(keep);
        self.reindex();
        self.invalidate_caches();

        debug!(after = turn, removed, "truncated journal");
        self.subscriptions
            .broadcast(JournalEvent::Truncated { after: turn, removed });
        removed
    }

    /// Discard the whole journal (new session).
    pub fn clear(&mut self) {
        let removed = self.entries.len();
        self.entries.clear();
        self.reindex();
        self.invalidate_caches();
        self.subscriptions.broadcast(JournalEvent::Cleared { removed });
    }

    // --- Rewind / query ---

    /// Materialize the state at `turn` from the nearest keyframe at or
    /// before it.
    pub fn get_state_at_turn(&self, turn: u64) -> Result<StateBundle> {
        let pos = self.position(turn).ok_or(JournalError::TurnNotFound(turn))?;

        if pos + 1 == self.entries.len() {
            if let Some(latest) = self.latest.read().as_ref() {
                return Ok(latest.clone());
            }
        }
        if let Some(cached) = self.recent.lock().get(&turn) {
            return Ok(cached.clone());
        }

        let start = self
            .keyframe_at_or_before(pos)
            .ok_or(JournalError::MissingKeyframe { turn })?;

        let mut cursor = ReplayCursor::new();
        for entry in &self.entries[start..=pos] {
            if let Some(warning) = cursor.advance(entry) {
                return Err(warning.into_error());
            }
        }
        let state = cursor.into_state().ok_or(JournalError::MissingKeyframe { turn })?;

        self.recent.lock().put(turn, state.clone());
        Ok(state)
    }

    /// Materialize `turn`, substituting and flagging instead of failing.
    ///
    /// Only `TurnNotFound` is an error here.
    pub fn reconstruct_with_recovery(&self, turn: u64) -> Result<Reconstruction> {
        let pos = self.position(turn).ok_or(JournalError::TurnNotFound(turn))?;
        let start = self.keyframe_at_or_before(pos).unwrap_or(0);

        let mut cursor = ReplayCursor::new();
        let mut warnings = Vec::new();
        for entry in &self.entries[start..=pos] {
            if let Some(warning) = cursor.advance(entry) {
                warn!(%warning, "recovered while reconstructing");
                warnings.push(warning);
            }
        }

        Ok(Reconstruction {
            state: cursor.into_state().unwrap_or_default(),
            warnings,
        })
    }

    /// State at the last turn, or `None` for an empty journal.
    ///
    /// Served from a cache kept current by `append`; after a truncation the
    /// cache is rebuilt on first use.
    pub fn get_latest_state(&self) -> Result<Option<StateBundle>> {
        let Some(last) = self.last_turn() else {
            return Ok(None);
        };
        if let Some(latest) = self.latest.read().as_ref() {
            return Ok(Some(latest.clone()));
        }

        let state = self.get_state_at_turn(last)?;
        *self.latest.write() = Some(state.clone());
        Ok(Some(state))
    }

    /// Replay the whole history and report every turn that needed recovery.
    pub fn verify(&self) -> Vec<RecoveryWarning> {
        let mut cursor = ReplayCursor::new();
        self.entries
            .iter()
            .filter_map(|entry| cursor.advance(entry))
            .collect()
    }

    // --- Accessors ---

    pub fn entries(&self) -> &[TurnHistoryEntry] {
        &self.entries
    }

    pub fn entry(&self, turn: u64) -> Option<&TurnHistoryEntry> {
        self.position(turn).map(|pos| &self.entries[pos])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_turn(&self) -> Option<u64> {
        self.entries.first().map(TurnHistoryEntry::turn)
    }

    pub fn last_turn(&self) -> Option<u64> {
        self.entries.last().map(TurnHistoryEntry::turn)
    }

    pub fn keyframe_count(&self) -> usize {
        self.keyframes.len()
    }

    /// Turn numbers of all keyframes, ascending.
    pub fn keyframe_turns(&self) -> Vec<u64> {
        self.keyframes
            .iter()
            .map(|&pos| self.entries[pos].turn())
            .collect()
    }

    pub fn stats(&self) -> JournalStats {
        let mut stats = JournalStats {
            entry_count: self.entries.len(),
            ..Default::default()
        };
        for entry in &self.entries {
            let bytes = entry.encoded_len() as u64;
            match entry.kind() {
                EntryKind::Keyframe => {
                    stats.keyframe_count += 1;
                    stats.keyframe_bytes += bytes;
                }
                EntryKind::Delta => {
                    stats.delta_count += 1;
                    stats.delta_bytes += bytes;
                }
            }
        }
        stats
    }

    /// Register an observer for journal changes.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        self.subscriptions.subscribe(config)
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    // --- Private Helpers ---

    fn position(&self, turn: u64) -> Option<usize> {
        self.entries
            .binary_search_by_key(&turn, TurnHistoryEntry::turn)
            .ok()
    }

    fn keyframe_at_or_before(&self, pos: usize) -> Option<usize> {
        let idx = self.keyframes.partition_point(|&k| k <= pos);
        idx.checked_sub(1).map(|i| self.keyframes[i])
    }

    fn last_keyframe_turn(&self) -> Option<u64> {
        self.keyframes.last().map(|&pos| self.entries[pos].turn())
    }

    /// Base state for diffing the next append.
    fn latest_for_append(&self) -> Option<StateBundle> {
        match self.get_latest_state() {
            Ok(state) => state,
            Err(err) => {
                warn!(error = %err, "latest state could not be reconstructed");
                None
            }
        }
    }

    fn reindex(&mut self) {
        self.keyframes = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is_keyframe())
            .map(|(pos, _)| pos)
            .collect();
        self.last_keyframe_size = self
            .keyframes
            .last()
            .and_then(|&pos| self.entries[pos].snapshot())
            .map(StateBundle::encoded_len)
            .unwrap_or(0);
    }

    fn invalidate_caches(&self) {
        *self.latest.write() = None;
        self.recent.lock().clear();
    }

    /// Drop whole keyframe groups from the front past `max_keyframes`.
    fn apply_retention(&mut self) {
        let Some(max) = self.config.max_keyframes else {
            return;
        };
        let max = max.max(1);
        if self.keyframes.len() <= max {
            return;
        }

        let cut = self.keyframes[self.keyframes.len() - max];
        let before = self.entries[cut].turn();
        self.entries.drain(..cut);
        self.reindex();
        self.recent.lock().clear();

        debug!(before, removed = cut, "retention pruned journal");
        self.subscriptions
            .broadcast(JournalEvent::Pruned { before, removed: cut });
    }
}

impl Default for Journal {
    fn default() -> Self {
        Self::new(JournalConfig::default())
    }
}
