//! Turn history entries and the rules that produce and replay them.
//!
//! A history is an ordered list of entries, one per completed turn. Each
//! entry is either a keyframe (complete snapshot) or a delta (patch pair
//! against the previous turn). Reconstruction starts at the nearest keyframe
//! and replays deltas forward.

mod entry;
mod policy;
mod replay;

pub use entry::{EntryKind, TurnHistoryEntry};
pub use policy::{KeyframeDecision, KeyframePolicy, KeyframeReason, DEFAULT_MIN_OVERRIDE_BYTES};
pub use replay::{RecoveryKind, RecoveryWarning};

pub(crate) use replay::ReplayCursor;
