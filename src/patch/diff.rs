//! Structural diff producing add/remove/replace patches.

use super::operations::{Patch, PatchOperation};
use super::pointer::push_token;
use serde_json::{Map, Value};

/// Upper bound on LCS table cells for one array window.
///
/// Past this, the changed window is treated as one block replacement, which
/// is still a correct (only larger) patch.
const LCS_CELL_LIMIT: usize = 1 << 20;

/// Compute a patch transforming `prev` into `next`.
pub fn diff(prev: &Value, next: &Value) -> Patch {
    let mut ops = Vec::new();
    diff_values(prev, next, "", &mut ops);
    Patch(ops)
}

/// Compute a patch between two sequences, addressed from the sequence root.
pub fn diff_sequences(prev: &[Value], next: &[Value]) -> Patch {
    let mut ops = Vec::new();
    diff_arrays(prev, next, "", &mut ops);
    Patch(ops)
}

fn diff_values(prev: &Value, next: &Value, path: &str, ops: &mut Vec<PatchOperation>) {
    if prev == next {
        return;
    }
    match (prev, next) {
        (Value::Object(a), Value::Object(b)) => diff_objects(a, b, path, ops),
        (Value::Array(a), Value::Array(b)) => diff_arrays(a, b, path, ops),
        _ => ops.push(PatchOperation::Replace {
            path: path.to_string(),
            value: next.clone(),
        }),
    }
}

fn diff_objects(
    prev: &Map<String, Value>,
    next: &Map<String, Value>,
    path: &str,
    ops: &mut Vec<PatchOperation>,
) {
    for (key, old) in prev {
        let child = push_token(path, key);
        match next.get(key) {
            Some(new) => diff_values(old, new, &child, ops),
            None => ops.push(PatchOperation::Remove { path: child }),
        }
    }
    for (key, new) in next {
        if !prev.contains_key(key) {
            ops.push(PatchOperation::Add {
                path: push_token(path, key),
                value: new.clone(),
            });
        }
    }
}

/// One step of an array edit script, indices into the changed window.
#[derive(Debug, PartialEq)]
enum Edit {
    Keep,
    Modify(usize, usize),
    Remove,
    Insert(usize),
}

fn diff_arrays(prev: &[Value], next: &[Value], path: &str, ops: &mut Vec<PatchOperation>) {
    let prefix = prev.iter().zip(next).take_while(|(a, b)| a == b).count();
    let max_suffix = prev.len().min(next.len()) - prefix;
    let suffix = prev
        .iter()
        .rev()
        .zip(next.iter().rev())
        .take(max_suffix)
        .take_while(|(a, b)| a == b)
        .count();

    let old = &prev[prefix..prev.len() - suffix];
    let new = &next[prefix..next.len() - suffix];

    // Position in the array as it looks after the ops emitted so far.
    let mut index = prefix;
    for edit in edit_script(old, new) {
        let at = push_token(path, &index.to_string());
        match edit {
            Edit::Keep => index += 1,
            Edit::Modify(i, j) => {
                diff_values(&old[i], &new[j], &at, ops);
                index += 1;
            }
            Edit::Remove => ops.push(PatchOperation::Remove { path: at }),
            Edit::Insert(j) => {
                ops.push(PatchOperation::Add {
                    path: at,
                    value: new[j].clone(),
                });
                index += 1;
            }
        }
    }
}

/// Build an edit script from the longest common subsequence of two windows.
///
/// Each run of non-matching elements between two kept elements is a block
/// replacement `old[i0..i1] -> new[j0..j1]`; its first `min` pairs become
/// in-place modifications, the rest plain removes or inserts.
fn edit_script(old: &[Value], new: &[Value]) -> Vec<Edit> {
    let mut script = Vec::with_capacity(old.len().max(new.len()));
    let mut removed = Vec::new();
    let mut inserted = Vec::new();

    let cells = (old.len() + 1).saturating_mul(new.len() + 1);
    if old.is_empty() || new.is_empty() || cells > LCS_CELL_LIMIT {
        removed.extend(0..old.len());
        inserted.extend(0..new.len());
        flush_run(&mut removed, &mut inserted, &mut script);
        return script;
    }

    let table = lcs_table(old, new);
    let width = new.len() + 1;
    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        if old[i] == new[j] {
            flush_run(&mut removed, &mut inserted, &mut script);
            script.push(Edit::Keep);
            i += 1;
            j += 1;
        } else if table[(i + 1) * width + j] >= table[i * width + j + 1] {
            removed.push(i);
            i += 1;
        } else {
            inserted.push(j);
            j += 1;
        }
    }
    removed.extend(i..old.len());
    inserted.extend(j..new.len());
    flush_run(&mut removed, &mut inserted, &mut script);
    script
}

fn flush_run(removed: &mut Vec<usize>, inserted: &mut Vec<usize>, script: &mut Vec<Edit>) {
    let paired = removed.len().min(inserted.len());
    for (&i, &j) in removed.iter().zip(inserted.iter()) {
        script.push(Edit::Modify(i, j));
    }
    for _ in paired..removed.len() {
        script.push(Edit::Remove);
    }
    for &j in &inserted[paired..] {
        script.push(Edit::Insert(j));
    }
    removed.clear();
    inserted.clear();
}

/// Suffix LCS lengths: `table[i * (m + 1) + j]` is the LCS of `old[i..]`, `new[j..]`.
fn lcs_table(old: &[Value], new: &[Value]) -> Vec<u32> {
    let (n, m) = (old.len(), new.len());
    let width = m + 1;
    let mut table = vec![0u32; (n + 1) * width];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            table[i * width + j] = if old[i] == new[j] {
                table[(i + 1) * width + j + 1] + 1
            } else {
                table[(i + 1) * width + j].max(table[i * width + j + 1])
            };
        }
    }
    table
}
