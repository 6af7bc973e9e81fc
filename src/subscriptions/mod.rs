//! Subscriptions to journal changes.
//!
//! Observers (UI layers, autosave) register explicitly and receive events on
//! a bounded channel:
//! - Appended turns (optionally filtered by entry kind)
//! - Rewinds, clears and retention pruning
//!
//! A subscriber whose buffer fills up is dropped rather than blocking the
//! journal.
//!
//! # Example
//!
//! ```ignore
//! let handle = journal.subscribe(SubscriptionConfig::default());
//! journal.append(1, kb, messages)?;
//!
//! for event in handle.drain() {
//!     if let JournalEvent::Appended { turn, .. } = event {
//!         println!("turn {turn} recorded");
//!     }
//! }
//! ```

mod manager;
mod types;

pub use manager::SubscriptionManager;
pub use types::{
    DropReason, JournalEvent, SubscriptionConfig, SubscriptionFilter, SubscriptionHandle,
    SubscriptionId,
};
