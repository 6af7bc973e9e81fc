//! On-disk persistence tests.

use serde_json::json;
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use turn_journal::{
    FileBackend, FileBackendConfig, Journal, JournalConfig, JournalError, SaveBackend,
    SaveManager, Session, SlotId, StateBundle,
};

fn open_manager(dir: &TempDir) -> SaveManager<FileBackend> {
    let backend = FileBackend::open(FileBackendConfig {
        path: dir.path().join("saves"),
        create_if_missing: true,
    })
    .unwrap();
    SaveManager::new(backend, JournalConfig::with_interval(5))
}

fn bundle(turn: u64) -> StateBundle {
    let quests: Vec<_> = (0..turn % 5)
        .map(|q| json!({ "id": q, "done": q * 5 < turn }))
        .collect();
    let mood = if turn % 3 == 0 { "angry" } else { "calm" };
    StateBundle::new(
        json!({
            "counter": turn,
            "npcs": { "smith": { "mood": mood } },
            "quests": quests,
            "nothing": null,
            "ratio": turn as f64 / 4.0,
        }),
        (1..=turn).map(|i| json!({ "turn": i })).collect(),
    )
}

#[test]
fn test_save_reload_across_reopen() {
    let dir = TempDir::new().unwrap();
    let slot = SlotId::from("campaign");

    {
        let manager = open_manager(&dir);
        let mut journal = Journal::new(JournalConfig::with_interval(5));
        for turn in 1..=23 {
            journal.append_bundle(turn, bundle(turn)).unwrap();
        }
        manager.save(&slot, "Campaign", &journal).unwrap();
    }

    // Lock released on drop; a new process could open the directory.
    let manager = open_manager(&dir);
    let loaded = manager.load(&slot).unwrap();
    assert!(loaded.warnings.is_empty());
    assert_eq!(loaded.meta.turn_count, 23);
    assert_eq!(loaded.journal.keyframe_turns(), vec![1, 6, 11, 16, 21]);
    for turn in 1..=23 {
        assert_eq!(loaded.journal.reconstruct(turn).unwrap(), bundle(turn));
    }
}

#[test]
fn test_stored_history_is_compacted() {
    let dir = TempDir::new().unwrap();
    let manager = open_manager(&dir);
    let slot = SlotId::from("compact");

    let mut journal = Journal::new(JournalConfig::with_interval(5));
    for turn in 1..=9 {
        journal.append_bundle(turn, bundle(turn)).unwrap();
    }
    manager.save(&slot, "Compact", &journal).unwrap();

    let stored = manager.backend().get(&slot).unwrap().unwrap();
    assert!(stored
        .compacted_state_history
        .iter()
        .all(|e| e.is_keyframe() || e.snapshot().is_none()));
    assert_eq!(stored.compacted_state_history, journal.entries());
    assert_eq!(stored.current_messages, bundle(9).messages);

    // Saving the reloaded journal again writes the same history.
    let reloaded = manager.load(&slot).unwrap().journal;
    manager.save(&slot, "Compact", &reloaded).unwrap();
    let again = manager.backend().get(&slot).unwrap().unwrap();
    assert_eq!(again.compacted_state_history, stored.compacted_state_history);
}

#[test]
fn test_session_on_disk_with_rewind() {
    let dir = TempDir::new().unwrap();
    let manager = Arc::new(open_manager(&dir));
    let slot = SlotId::from("story");

    let mut session = Session::new(slot.clone(), "Story", Arc::clone(&manager));
    for turn in 1..=15 {
        session.on_turn_completed(bundle(turn)).unwrap();
    }
    session.request_rewind(8).unwrap();
    session.save().unwrap();

    let reopened = Session::open(slot, manager).unwrap();
    assert_eq!(reopened.journal().last_turn(), Some(8));
    assert_eq!(reopened.latest_state().unwrap(), Some(bundle(8)));
}

#[test]
fn test_export_import_through_files() {
    let dir = TempDir::new().unwrap();
    let manager = open_manager(&dir);
    let slot = SlotId::from("origin");

    let mut journal = Journal::new(JournalConfig::with_interval(5));
    for turn in 1..=12 {
        journal.append_bundle(turn, bundle(turn)).unwrap();
    }
    manager.save(&slot, "Origin", &journal).unwrap();

    let export_path = dir.path().join("origin.export");
    fs::write(&export_path, manager.request_export(&slot, true).unwrap()).unwrap();

    let imported = manager
        .request_import(&fs::read(&export_path).unwrap())
        .unwrap();
    let loaded = manager.load(&imported).unwrap();
    for turn in 1..=12 {
        assert_eq!(loaded.journal.reconstruct(turn).unwrap(), bundle(turn));
    }

    let slots: Vec<SlotId> = manager.list().unwrap().into_iter().map(|m| m.slot).collect();
    assert!(slots.contains(&slot));
    assert!(slots.contains(&imported));
}

#[test]
fn test_truncated_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let manager = open_manager(&dir);
    let slot = SlotId::from("short");

    let mut journal = Journal::new(JournalConfig::default());
    journal.append_bundle(1, bundle(1)).unwrap();
    manager.save(&slot, "Short", &journal).unwrap();

    let path = dir.path().join("saves").join("short.sav");
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() - 6]).unwrap();

    assert!(matches!(manager.load(&slot), Err(JournalError::InvalidFormat(_))));
    // Unreadable slots are skipped when listing.
    assert!(manager.list().unwrap().is_empty());
}
