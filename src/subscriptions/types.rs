//! Subscription types for journal change notifications.

use crate::history::EntryKind;
use serde::{Deserialize, Serialize};

/// Configuration for a subscription.
#[derive(Clone, Debug)]
pub struct SubscriptionConfig {
    /// Max buffered events before dropping subscriber.
    /// Default: 256
    pub buffer_size: usize,

    /// Filter criteria.
    pub filter: SubscriptionFilter,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            buffer_size: 256,
            filter: SubscriptionFilter::all(),
        }
    }
}

/// Filter criteria for subscriptions.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionFilter {
    /// Only appended entries of these kinds (None = all kinds).
    pub entry_kinds: Option<Vec<EntryKind>>,

    /// Include append events.
    pub include_appends: bool,

    /// Include truncation, clear and prune events.
    pub include_history_changes: bool,
}

impl SubscriptionFilter {
    /// Every appended turn.
    pub fn appends() -> Self {
        Self {
            include_appends: true,
            ..Default::default()
        }
    }

    /// Only appended keyframes.
    pub fn keyframes() -> Self {
        Self {
            entry_kinds: Some(vec![EntryKind::Keyframe]),
            include_appends: true,
            ..Default::default()
        }
    }

    /// Rewinds, clears and retention pruning.
    pub fn history_changes() -> Self {
        Self {
            include_history_changes: true,
            ..Default::default()
        }
    }

    /// Everything.
    pub fn all() -> Self {
        Self {
            entry_kinds: None,
            include_appends: true,
            include_history_changes: true,
        }
    }
}

/// Events emitted by the journal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalEvent {
    /// A turn was appended.
    Appended { turn: u64, kind: EntryKind },

    /// Entries after `after` were discarded (rewind).
    Truncated { after: u64, removed: usize },

    /// The whole journal was discarded.
    Cleared { removed: usize },

    /// Retention dropped entries before `before`.
    Pruned { before: u64, removed: usize },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Handle to manage a subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<JournalEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<JournalEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<JournalEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<JournalEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered.
    pub fn drain(&self) -> Vec<JournalEvent> {
        self.receiver.try_iter().collect()
    }
}
