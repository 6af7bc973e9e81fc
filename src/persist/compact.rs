//! Compaction (storage form) and expansion (portable form) of histories.

use crate::history::{RecoveryWarning, ReplayCursor, TurnHistoryEntry};
use tracing::warn;

/// Minimal storage representation.
///
/// Keyframes keep their snapshot; deltas keep only their patch pair. Applying
/// this to an already compacted list returns an equal list.
pub fn compact_for_storage(entries: &[TurnHistoryEntry]) -> Vec<TurnHistoryEntry> {
    entries.iter().map(TurnHistoryEntry::compacted).collect()
}

/// A history where every entry carries a full snapshot.
#[derive(Clone, Debug, Default)]
pub struct ExpandedHistory {
    pub entries: Vec<TurnHistoryEntry>,
    /// One warning per entry whose snapshot came from recovery.
    pub warnings: Vec<RecoveryWarning>,
}

impl ExpandedHistory {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Materialize a snapshot into a copy of every delta, in turn order.
///
/// A delta with no reachable keyframe is replayed over the sentinel empty
/// bundle; a delta whose patch does not apply carries the previous state.
/// Either way the copy is flagged `recovered` and processing continues with
/// the rest of the history. The input entries are never modified.
pub fn expand_for_export(entries: &[TurnHistoryEntry]) -> ExpandedHistory {
    let mut ordered: Vec<&TurnHistoryEntry> = entries.iter().collect();
    ordered.sort_by_key(|e| e.turn());

    let mut cursor = ReplayCursor::new();
    let mut expanded = ExpandedHistory {
        entries: Vec::with_capacity(ordered.len()),
        warnings: Vec::new(),
    };

    for entry in ordered {
        let warning = cursor.advance(entry);
        let copy = match entry {
            TurnHistoryEntry::Keyframe { .. } => entry.clone(),
            TurnHistoryEntry::Delta {
                turn,
                kb_patch,
                messages_patch,
                ..
            } => TurnHistoryEntry::Delta {
                turn: *turn,
                kb_patch: kb_patch.clone(),
                messages_patch: messages_patch.clone(),
                snapshot: cursor.state().cloned(),
                recovered: warning.is_some(),
            },
        };

        if let Some(warning) = warning {
            warn!(%warning, "expanded entry recovered with warning");
            expanded.warnings.push(warning);
        }
        expanded.entries.push(copy);
    }

    expanded
}
