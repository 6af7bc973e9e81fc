//! Journal entry types.

use crate::patch::Patch;
use crate::types::StateBundle;
use serde::{Deserialize, Serialize};

/// Whether an entry is a keyframe or a delta.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Keyframe,
    Delta,
}

/// One completed turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnHistoryEntry {
    /// Complete, self-sufficient copy of the state at `turn`.
    Keyframe { turn: u64, snapshot: StateBundle },

    /// Patches transforming the state at `turn - 1` into the state at `turn`.
    Delta {
        turn: u64,
        kb_patch: Patch,
        messages_patch: Patch,

        /// Materialized state, only present on expanded (export) copies.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        snapshot: Option<StateBundle>,

        /// Set on expanded copies whose snapshot came from recovery.
        #[serde(default, skip_serializing_if = "is_false")]
        recovered: bool,
    },
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl TurnHistoryEntry {
    /// Build a delta entry without a carried snapshot.
    pub fn delta(turn: u64, kb_patch: Patch, messages_patch: Patch) -> Self {
        TurnHistoryEntry::Delta {
            turn,
            kb_patch,
            messages_patch,
            snapshot: None,
            recovered: false,
        }
    }

    pub fn turn(&self) -> u64 {
        match self {
            TurnHistoryEntry::Keyframe { turn, .. } | TurnHistoryEntry::Delta { turn, .. } => *turn,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            TurnHistoryEntry::Keyframe { .. } => EntryKind::Keyframe,
            TurnHistoryEntry::Delta { .. } => EntryKind::Delta,
        }
    }

    pub fn is_keyframe(&self) -> bool {
        matches!(self, TurnHistoryEntry::Keyframe { .. })
    }

    /// Snapshot carried by this entry, if any.
    pub fn snapshot(&self) -> Option<&StateBundle> {
        match self {
            TurnHistoryEntry::Keyframe { snapshot, .. } => Some(snapshot),
            TurnHistoryEntry::Delta { snapshot, .. } => snapshot.as_ref(),
        }
    }

    pub fn is_recovered(&self) -> bool {
        matches!(self, TurnHistoryEntry::Delta { recovered: true, .. })
    }

    /// Storage representation: deltas lose any carried snapshot and flag.
    pub fn compacted(&self) -> Self {
        match self {
            TurnHistoryEntry::Keyframe { .. } => self.clone(),
            TurnHistoryEntry::Delta {
                turn,
                kb_patch,
                messages_patch,
                ..
            } => TurnHistoryEntry::delta(*turn, kb_patch.clone(), messages_patch.clone()),
        }
    }

    /// Serialized JSON size in bytes.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::PatchOperation;
    use serde_json::json;

    fn sample_delta() -> TurnHistoryEntry {
        TurnHistoryEntry::delta(
            4,
            Patch(vec![PatchOperation::Replace {
                path: "/hp".into(),
                value: json!(3),
            }]),
            Patch::new(),
        )
    }

    #[test]
    fn test_entry_tagging() {
        let keyframe = TurnHistoryEntry::Keyframe {
            turn: 1,
            snapshot: StateBundle::empty(),
        };
        let wire = serde_json::to_value(&keyframe).unwrap();
        assert_eq!(wire["type"], "keyframe");
        assert_eq!(wire["turn"], 1);

        let wire = serde_json::to_value(sample_delta()).unwrap();
        assert_eq!(wire["type"], "delta");
        assert!(wire.get("snapshot").is_none());
        assert!(wire.get("recovered").is_none());
        assert_eq!(wire["kb_patch"][0]["op"], "replace");
    }

    #[test]
    fn test_compacted_strips_snapshot() {
        let mut entry = sample_delta();
        if let TurnHistoryEntry::Delta {
            snapshot, recovered, ..
        } = &mut entry
        {
            *snapshot = Some(StateBundle::empty());
            *recovered = true;
        }
        assert!(entry.snapshot().is_some());
        assert!(entry.is_recovered());

        let compacted = entry.compacted();
        assert!(compacted.snapshot().is_none());
        assert!(!compacted.is_recovered());
        assert_eq!(compacted, sample_delta());
    }

    #[test]
    fn test_keyframe_compaction_keeps_snapshot() {
        let keyframe = TurnHistoryEntry::Keyframe {
            turn: 2,
            snapshot: StateBundle::new(json!({"a": 1}), vec![json!("m")]),
        };
        assert_eq!(keyframe.compacted(), keyframe);
        assert_eq!(keyframe.kind(), EntryKind::Keyframe);
        assert!(keyframe.is_keyframe());
    }
}
