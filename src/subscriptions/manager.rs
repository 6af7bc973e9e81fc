//! Subscription manager for broadcasting journal events.

use crate::history::EntryKind;
use crossbeam_channel::{bounded, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::types::{
    DropReason, JournalEvent, SubscriptionConfig, SubscriptionHandle, SubscriptionId,
};

/// Internal subscription state.
struct Subscription {
    config: SubscriptionConfig,
    sender: Sender<JournalEvent>,
}

impl Subscription {
    /// Try to send an event. Returns false if buffer is full or the receiver is gone.
    fn try_send(&self, event: JournalEvent) -> bool {
        self.sender.try_send(event).is_ok()
    }

    fn matches(&self, event: &JournalEvent) -> bool {
        let filter = &self.config.filter;
        match event {
            JournalEvent::Appended { kind, .. } => {
                filter.include_appends && accepts_kind(&filter.entry_kinds, *kind)
            }
            JournalEvent::Truncated { .. }
            | JournalEvent::Cleared { .. }
            | JournalEvent::Pruned { .. } => filter.include_history_changes,
            JournalEvent::Dropped { .. } => true,
        }
    }
}

fn accepts_kind(kinds: &Option<Vec<EntryKind>>, kind: EntryKind) -> bool {
    kinds.as_ref().map_or(true, |kinds| kinds.contains(&kind))
}

/// Manages subscriptions and broadcasts events.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscriptions: RwLock<HashMap<SubscriptionId, Subscription>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a new subscription.
    pub fn subscribe(&self, config: SubscriptionConfig) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = bounded(config.buffer_size.max(1));

        self.subscriptions
            .write()
            .insert(id, Subscription { config, sender });

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subscriptions.write();
        if let Some(sub) = subs.remove(&id) {
            // Best effort
            let _ = sub.sender.try_send(JournalEvent::Dropped {
                reason: DropReason::Unsubscribed,
            });
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().len()
    }

    /// Broadcast an event. Drops subscribers that fail to receive.
    pub fn broadcast(&self, event: JournalEvent) {
        let mut to_remove = Vec::new();

        {
            let subs = self.subscriptions.read();
            if subs.is_empty() {
                return;
            }
            for (id, sub) in subs.iter() {
                if sub.matches(&event) && !sub.try_send(event.clone()) {
                    to_remove.push(*id);
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscriptions.write();
            for id in to_remove {
                if subs.remove(&id).is_some() {
                    tracing::debug!(subscription = id.0, "dropped slow journal subscriber");
                }
            }
        }
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscriptions::SubscriptionFilter;
    use std::time::Duration;

    #[test]
    fn test_subscribe_unsubscribe() {
        let manager = SubscriptionManager::new();

        let handle = manager.subscribe(SubscriptionConfig::default());
        assert_eq!(manager.subscription_count(), 1);

        manager.unsubscribe(handle.id);
        assert_eq!(manager.subscription_count(), 0);
        assert!(matches!(
            handle.try_recv().unwrap(),
            JournalEvent::Dropped {
                reason: DropReason::Unsubscribed
            }
        ));
    }

    #[test]
    fn test_broadcast_to_matching() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::keyframes(),
            ..Default::default()
        });

        manager.broadcast(JournalEvent::Appended {
            turn: 1,
            kind: EntryKind::Keyframe,
        });
        manager.broadcast(JournalEvent::Appended {
            turn: 2,
            kind: EntryKind::Delta,
        });
        manager.broadcast(JournalEvent::Truncated {
            after: 1,
            removed: 1,
        });

        let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(
            event,
            JournalEvent::Appended {
                turn: 1,
                kind: EntryKind::Keyframe
            }
        );
        assert!(handle.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_history_changes_filter() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe(SubscriptionConfig {
            filter: SubscriptionFilter::history_changes(),
            ..Default::default()
        });

        manager.broadcast(JournalEvent::Appended {
            turn: 1,
            kind: EntryKind::Keyframe,
        });
        manager.broadcast(JournalEvent::Cleared { removed: 1 });

        assert_eq!(handle.drain(), vec![JournalEvent::Cleared { removed: 1 }]);
    }

    #[test]
    fn test_drop_slow_subscriber() {
        let manager = SubscriptionManager::new();
        let _handle = manager.subscribe(SubscriptionConfig {
            buffer_size: 2,
            filter: SubscriptionFilter::appends(),
        });

        for turn in 0..10 {
            manager.broadcast(JournalEvent::Appended {
                turn,
                kind: EntryKind::Delta,
            });
        }

        assert_eq!(manager.subscription_count(), 0);
    }
}
