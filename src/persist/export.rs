//! Portable export documents.
//!
//! An export carries the fully expanded history (every entry has a snapshot)
//! so a reader never needs a patch engine. Importing verifies the carried
//! snapshots against replay and compacts the result back to storage form.

use super::compact::{compact_for_storage, expand_for_export};
use crate::error::{JournalError, Result};
use crate::history::{RecoveryWarning, ReplayCursor, TurnHistoryEntry};
use crate::journal::{Journal, JournalConfig};
use crate::types::{Hash, SlotId, Timestamp, APP_VERSION};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Current export document version.
pub const EXPORT_FORMAT_VERSION: u32 = 1;

/// Leading bytes of a zstd frame.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

const ZSTD_LEVEL: i32 = 3;

/// Export encoding options.
#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    /// zstd-compress the JSON document.
    pub compress: bool,
}

impl ExportOptions {
    pub fn optimized(optimized: bool) -> Self {
        Self { compress: optimized }
    }
}

/// Session metadata written alongside the history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub name: String,
    #[serde(default)]
    pub source_slot: Option<SlotId>,
    pub exported_at: Timestamp,
    pub turn_count: usize,
    pub first_turn: Option<u64>,
    pub latest_turn: Option<u64>,
}

/// A self-contained exported session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportDocument {
    pub format_version: u32,
    pub app_version: String,
    pub session: SessionMeta,
    /// Expanded history, sorted by turn.
    pub history: Vec<TurnHistoryEntry>,
    /// Hex SHA-256 of the JSON-encoded `history`.
    pub history_digest: String,
    /// Recovery performed while expanding.
    #[serde(default)]
    pub warnings: Vec<RecoveryWarning>,
}

/// Result of turning an export back into a journal.
pub struct ImportedJournal {
    pub journal: Journal,
    /// Recovery still needed when replaying the imported history.
    pub warnings: Vec<RecoveryWarning>,
    /// Turns whose delta was replaced by a keyframe of its carried snapshot.
    pub promoted: Vec<u64>,
}

impl ExportDocument {
    /// Expand `journal` into an export document.
    pub fn from_journal(
        name: impl Into<String>,
        source_slot: Option<SlotId>,
        journal: &Journal,
    ) -> Result<Self> {
        let expanded = expand_for_export(journal.entries());
        let history_digest = history_digest(&expanded.entries)?.to_hex();

        let session = SessionMeta {
            name: name.into(),
            source_slot,
            exported_at: Timestamp::now(),
            turn_count: expanded.entries.len(),
            first_turn: expanded.entries.first().map(TurnHistoryEntry::turn),
            latest_turn: expanded.entries.last().map(TurnHistoryEntry::turn),
        };

        debug!(
            name = %session.name,
            turns = session.turn_count,
            warnings = expanded.warnings.len(),
            "built export document"
        );

        Ok(Self {
            format_version: EXPORT_FORMAT_VERSION,
            app_version: APP_VERSION.to_string(),
            session,
            history: expanded.entries,
            history_digest,
            warnings: expanded.warnings,
        })
    }

    /// Encode as JSON, zstd-compressed if requested.
    pub fn to_bytes(&self, options: &ExportOptions) -> Result<Vec<u8>> {
        let json = serde_json::to_vec(self)?;
        if !options.compress {
            return Ok(json);
        }
        let compressed = zstd::encode_all(&json[..], ZSTD_LEVEL)?;
        debug!(raw = json.len(), compressed = compressed.len(), "compressed export");
        Ok(compressed)
    }

    /// Decode an export, detecting compression and verifying the digest.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let json = if bytes.starts_with(&ZSTD_MAGIC) {
            zstd::decode_all(bytes)?
        } else {
            bytes.to_vec()
        };

        let doc: ExportDocument = serde_json::from_slice(&json)
            .map_err(|e| JournalError::InvalidFormat(format!("not an export document: {e}")))?;

        if doc.format_version != EXPORT_FORMAT_VERSION {
            return Err(JournalError::InvalidFormat(format!(
                "Unsupported export format version: {}",
                doc.format_version
            )));
        }

        let expected = Hash::from_hex(&doc.history_digest)
            .map_err(|_| JournalError::InvalidFormat("malformed history digest".into()))?;
        let got = history_digest(&doc.history)?;
        if expected != got {
            return Err(JournalError::HashMismatch { expected, got });
        }

        Ok(doc)
    }

    /// Normalize the history and build a journal from it.
    pub fn into_journal(self, config: JournalConfig) -> Result<ImportedJournal> {
        let (entries, promoted) = normalize_imported(self.history);
        let journal = Journal::from_entries(config, entries)?;
        let warnings = journal.verify();

        for warning in &warnings {
            warn!(%warning, "imported history needs recovery");
        }

        Ok(ImportedJournal {
            journal,
            warnings,
            promoted,
        })
    }
}

/// SHA-256 over the JSON encoding of `history`.
fn history_digest(history: &[TurnHistoryEntry]) -> Result<Hash> {
    Ok(Hash::from_bytes(&serde_json::to_vec(history)?))
}

/// Compact an expanded history, trusting carried snapshots over patches.
///
/// A delta whose patch fails, has no base, or replays to something other
/// than its carried snapshot becomes a keyframe of that snapshot. Returns the
/// storage-form entries and the promoted turns.
pub fn normalize_imported(
    mut history: Vec<TurnHistoryEntry>,
) -> (Vec<TurnHistoryEntry>, Vec<u64>) {
    history.sort_by_key(TurnHistoryEntry::turn);

    let mut cursor = ReplayCursor::new();
    let mut promoted = Vec::new();
    let mut normalized = Vec::with_capacity(history.len());

    for entry in history {
        let carried = match &entry {
            TurnHistoryEntry::Delta {
                snapshot: Some(snapshot),
                ..
            } => Some(snapshot.clone()),
            _ => None,
        };

        let Some(carried) = carried else {
            cursor.advance(&entry);
            normalized.push(entry);
            continue;
        };

        let mut probe = cursor.clone();
        let warning = probe.advance(&entry);
        if warning.is_none() && probe.state() == Some(&carried) {
            cursor = probe;
            normalized.push(entry);
            continue;
        }

        let turn = entry.turn();
        debug!(turn, "promoting imported delta to keyframe");
        let keyframe = TurnHistoryEntry::Keyframe {
            turn,
            snapshot: carried,
        };
        cursor.advance(&keyframe);
        normalized.push(keyframe);
        promoted.push(turn);
    }

    (compact_for_storage(&normalized), promoted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::{Patch, PatchOperation};
    use crate::types::StateBundle;
    use serde_json::json;

    fn bundle(counter: u64) -> StateBundle {
        StateBundle::new(
            json!({ "counter": counter, "party": ["Ada", "Bram"] }),
            (1..=counter).map(|i| json!(format!("turn {i}"))).collect(),
        )
    }

    fn journal(turns: u64) -> Journal {
        let mut journal = Journal::new(JournalConfig::with_interval(3));
        for turn in 1..=turns {
            journal.append_bundle(turn, bundle(turn)).unwrap();
        }
        journal
    }

    #[test]
    fn test_export_import_roundtrip() {
        let original = journal(8);
        for compress in [false, true] {
            let doc = ExportDocument::from_journal("Run", None, &original).unwrap();
            let bytes = doc.to_bytes(&ExportOptions { compress }).unwrap();
            assert_eq!(bytes.starts_with(&ZSTD_MAGIC), compress);

            let imported = ExportDocument::from_bytes(&bytes)
                .unwrap()
                .into_journal(JournalConfig::with_interval(3))
                .unwrap();
            assert!(imported.warnings.is_empty());
            assert!(imported.promoted.is_empty());
            assert_eq!(imported.journal.entries(), original.entries());
            for turn in 1..=8 {
                assert_eq!(imported.journal.reconstruct(turn).unwrap(), bundle(turn));
            }
        }
    }

    #[test]
    fn test_session_meta() {
        let doc =
            ExportDocument::from_journal("Run", Some(SlotId::from("s1")), &journal(5)).unwrap();
        assert_eq!(doc.session.turn_count, 5);
        assert_eq!(doc.session.first_turn, Some(1));
        assert_eq!(doc.session.latest_turn, Some(5));
        assert_eq!(doc.app_version, APP_VERSION);
        assert!(doc.history.iter().all(|e| e.snapshot().is_some()));
    }

    #[test]
    fn test_tampered_history_rejected() {
        let mut doc = ExportDocument::from_journal("Run", None, &journal(4)).unwrap();
        doc.history.pop();
        let bytes = doc.to_bytes(&ExportOptions::default()).unwrap();
        assert!(matches!(
            ExportDocument::from_bytes(&bytes),
            Err(JournalError::HashMismatch { .. })
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            ExportDocument::from_bytes(b"not json"),
            Err(JournalError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_disagreeing_snapshot_is_promoted() {
        let mut history = expand_for_export(journal(4).entries()).entries;
        // Carried snapshot for turn 2 no longer matches its patch, and turn
        // 3's patch no longer applies on top of it.
        if let TurnHistoryEntry::Delta { snapshot, .. } = &mut history[1] {
            *snapshot = Some(StateBundle::new(json!({"edited": true}), vec![]));
        }

        let (entries, promoted) = normalize_imported(history);
        assert_eq!(promoted, vec![2, 3]);
        assert!(entries[1].is_keyframe() && entries[2].is_keyframe());
        assert!(entries.iter().all(|e| e.is_keyframe() || e.snapshot().is_none()));
    }

    #[test]
    fn test_broken_patch_is_promoted() {
        let history = vec![
            TurnHistoryEntry::Keyframe {
                turn: 1,
                snapshot: bundle(1),
            },
            TurnHistoryEntry::Delta {
                turn: 2,
                kb_patch: Patch(vec![PatchOperation::Remove {
                    path: "/missing".into(),
                }]),
                messages_patch: Patch::new(),
                snapshot: Some(bundle(2)),
                recovered: false,
            },
        ];
        let (entries, promoted) = normalize_imported(history);
        assert_eq!(promoted, vec![2]);
        let journal = Journal::from_entries(JournalConfig::default(), entries).unwrap();
        assert_eq!(journal.reconstruct(2).unwrap(), bundle(2));
    }
}
