//! Property tests for the diff/patch engine.

use proptest::prelude::*;
use serde_json::{json, Map, Value};
use turn_journal::{
    apply_patch, apply_to_sequence, diff, diff_sequences, Journal, JournalConfig, StateBundle,
};

fn leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| json!(n)),
        (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
        "[a-z ]{0,8}".prop_map(Value::String),
    ]
}

/// Object keys include the pointer escape characters.
fn key() -> impl Strategy<Value = String> {
    "[a-c~/]{0,3}"
}

fn document() -> impl Strategy<Value = Value> {
    leaf().prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(key(), inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

#[derive(Clone, Debug)]
enum Edit {
    Insert(usize, Value),
    Remove(usize),
    Replace(usize, Value),
    Swap(usize, usize),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        (any::<usize>(), document()).prop_map(|(i, v)| Edit::Insert(i, v)),
        any::<usize>().prop_map(Edit::Remove),
        (any::<usize>(), document()).prop_map(|(i, v)| Edit::Replace(i, v)),
        (any::<usize>(), any::<usize>()).prop_map(|(i, j)| Edit::Swap(i, j)),
    ]
}

fn apply_edits(mut seq: Vec<Value>, edits: &[Edit]) -> Vec<Value> {
    for edit in edits {
        match edit.clone() {
            Edit::Insert(i, v) => {
                let at = i % (seq.len() + 1);
                seq.insert(at, v);
            }
            Edit::Remove(i) if !seq.is_empty() => {
                let at = i % seq.len();
                seq.remove(at);
            }
            Edit::Replace(i, v) if !seq.is_empty() => {
                let at = i % seq.len();
                seq[at] = v;
            }
            Edit::Swap(i, j) if !seq.is_empty() => {
                let len = seq.len();
                seq.swap(i % len, j % len);
            }
            _ => {}
        }
    }
    seq
}

proptest! {
    #[test]
    fn prop_diff_apply_roundtrip(prev in document(), next in document()) {
        let patch = diff(&prev, &next);
        prop_assert_eq!(apply_patch(&prev, &patch).unwrap(), next);
    }

    #[test]
    fn prop_identical_documents_give_empty_patch(doc in document()) {
        prop_assert!(diff(&doc, &doc).is_empty());
    }

    #[test]
    fn prop_sequence_edits_roundtrip(
        base in prop::collection::vec(document(), 0..12),
        edits in prop::collection::vec(edit(), 0..8),
    ) {
        let next = apply_edits(base.clone(), &edits);
        let patch = diff_sequences(&base, &next);
        prop_assert_eq!(apply_to_sequence(&base, &patch).unwrap(), next);
    }

    #[test]
    fn prop_append_only_log_is_cheap(
        base in prop::collection::vec(leaf(), 0..20),
        tail in prop::collection::vec(leaf(), 1..4),
    ) {
        let mut next = base.clone();
        next.extend(tail.iter().cloned());
        let patch = diff_sequences(&base, &next);
        prop_assert_eq!(patch.len(), tail.len());
    }

    #[test]
    fn prop_journal_reconstructs_every_turn(
        states in prop::collection::vec(
            (document(), prop::collection::vec(leaf(), 0..5)),
            1..15,
        ),
        k in 1u64..6,
    ) {
        let mut journal = Journal::new(JournalConfig::with_interval(k));
        let bundles: Vec<StateBundle> = states
            .into_iter()
            .map(|(kb, messages)| StateBundle::new(kb, messages))
            .collect();
        for (i, bundle) in bundles.iter().enumerate() {
            journal.append_bundle(i as u64 + 1, bundle.clone()).unwrap();
        }
        for (i, bundle) in bundles.iter().enumerate() {
            prop_assert_eq!(&journal.reconstruct(i as u64 + 1).unwrap(), bundle);
        }
    }
}
