//! Forward replay of keyframes and deltas, with flagged recovery.

use super::entry::TurnHistoryEntry;
use crate::error::JournalError;
use crate::patch::{apply_patch, apply_to_sequence};
use crate::types::StateBundle;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What went wrong while materializing one turn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecoveryKind {
    /// The delta had no reachable keyframe; an empty base was substituted.
    MissingKeyframe,

    /// A patch did not resolve; the previous state was carried forward.
    PatchApplication {
        op_index: usize,
        path: String,
        reason: String,
    },
}

/// A non-fatal problem found during replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryWarning {
    pub turn: u64,
    #[serde(flatten)]
    pub kind: RecoveryKind,
}

impl RecoveryWarning {
    /// The strict-mode error for this warning.
    pub fn into_error(self) -> JournalError {
        match self.kind {
            RecoveryKind::MissingKeyframe => JournalError::MissingKeyframe { turn: self.turn },
            RecoveryKind::PatchApplication {
                op_index,
                path,
                reason,
            } => JournalError::PatchApplication {
                op_index,
                path,
                reason,
            },
        }
    }
}

impl fmt::Display for RecoveryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RecoveryKind::MissingKeyframe => {
                write!(f, "turn {}: no preceding keyframe", self.turn)
            }
            RecoveryKind::PatchApplication {
                op_index,
                path,
                reason,
            } => write!(
                f,
                "turn {}: patch op {} at {:?} failed: {}",
                self.turn, op_index, path, reason
            ),
        }
    }
}

/// Running materialized state while walking entries in turn order.
///
/// Keyframes reseed the state. A delta applies to the state of the
/// immediately preceding turn; if that turn was never materialized (no
/// keyframe yet, or a gap in turn numbers) the sentinel empty bundle is
/// used instead and the step reports `MissingKeyframe`.
#[derive(Clone, Debug, Default)]
pub(crate) struct ReplayCursor {
    state: Option<StateBundle>,
    turn: Option<u64>,
}

impl ReplayCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize `entry`, returning a warning if recovery was needed.
    pub fn advance(&mut self, entry: &TurnHistoryEntry) -> Option<RecoveryWarning> {
        match entry {
            TurnHistoryEntry::Keyframe { turn, snapshot } => {
                self.state = Some(snapshot.clone());
                self.turn = Some(*turn);
                None
            }
            TurnHistoryEntry::Delta {
                turn,
                kb_patch,
                messages_patch,
                ..
            } => {
                let chained = self.turn.is_some_and(|prev| prev + 1 == *turn);
                let carried = if chained { self.state.take() } else { None };

                let mut warning = None;
                let base = match carried {
                    Some(state) => state,
                    None => {
                        warning = Some(RecoveryWarning {
                            turn: *turn,
                            kind: RecoveryKind::MissingKeyframe,
                        });
                        StateBundle::empty()
                    }
                };

                let applied = apply_patch(&base.knowledge_base, kb_patch).and_then(|kb| {
                    apply_to_sequence(&base.messages, messages_patch)
                        .map(|messages| StateBundle::new(kb, messages))
                });

                let next = match applied {
                    Ok(next) => next,
                    Err(err) => {
                        if warning.is_none() {
                            warning = Some(patch_warning(*turn, err));
                        }
                        base
                    }
                };

                self.state = Some(next);
                self.turn = Some(*turn);
                warning
            }
        }
    }

    pub fn state(&self) -> Option<&StateBundle> {
        self.state.as_ref()
    }

    pub fn into_state(self) -> Option<StateBundle> {
        self.state
    }
}

fn patch_warning(turn: u64, err: JournalError) -> RecoveryWarning {
    let kind = match err {
        JournalError::PatchApplication {
            op_index,
            path,
            reason,
        } => RecoveryKind::PatchApplication {
            op_index,
            path,
            reason,
        },
        other => RecoveryKind::PatchApplication {
            op_index: 0,
            path: String::new(),
            reason: other.to_string(),
        },
    };
    RecoveryWarning { turn, kind }
}
