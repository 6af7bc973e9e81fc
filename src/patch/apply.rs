//! Patch application.

use super::operations::{Patch, PatchOperation};
use super::pointer::{parse_index, parse_pointer};
use crate::error::{JournalError, Result};
use serde_json::Value;

/// Apply a patch to a document, returning the patched copy.
///
/// Operations are replayed strictly in order against a private copy. If any
/// operation fails to resolve, the whole patch fails and `base` is untouched.
pub fn apply_patch(base: &Value, patch: &Patch) -> Result<Value> {
    let mut doc = base.clone();
    for (op_index, op) in patch.iter().enumerate() {
        apply_operation(&mut doc, op).map_err(|reason| JournalError::PatchApplication {
            op_index,
            path: op.path().to_string(),
            reason,
        })?;
    }
    Ok(doc)
}

/// Apply a patch whose root is an array (the message log).
pub fn apply_to_sequence(base: &[Value], patch: &Patch) -> Result<Vec<Value>> {
    if patch.is_empty() {
        return Ok(base.to_vec());
    }
    match apply_patch(&Value::Array(base.to_vec()), patch)? {
        Value::Array(items) => Ok(items),
        other => Err(JournalError::PatchApplication {
            op_index: patch.len().saturating_sub(1),
            path: String::new(),
            reason: format!("sequence patch produced {}", kind(&other)),
        }),
    }
}

fn apply_operation(doc: &mut Value, op: &PatchOperation) -> std::result::Result<(), String> {
    match op {
        PatchOperation::Add { path, value } => add(doc, path, value.clone()),
        PatchOperation::Remove { path } => remove(doc, path),
        PatchOperation::Replace { path, value } => replace(doc, path, value.clone()),
    }
}

fn add(doc: &mut Value, path: &str, value: Value) -> std::result::Result<(), String> {
    let mut tokens = parse_pointer(path)?;
    let Some(last) = tokens.pop() else {
        *doc = value;
        return Ok(());
    };

    match resolve_mut(doc, &tokens)? {
        Value::Object(map) => {
            map.insert(last, value);
            Ok(())
        }
        Value::Array(items) => {
            let index = if last == "-" {
                items.len()
            } else {
                parse_index(&last)?
            };
            if index > items.len() {
                return Err(format!(
                    "insert index {} out of bounds (len {})",
                    index,
                    items.len()
                ));
            }
            items.insert(index, value);
            Ok(())
        }
        other => Err(format!("cannot add a member to {}", kind(other))),
    }
}

fn remove(doc: &mut Value, path: &str) -> std::result::Result<(), String> {
    let mut tokens = parse_pointer(path)?;
    let Some(last) = tokens.pop() else {
        return Err("cannot remove the document root".to_string());
    };

    match resolve_mut(doc, &tokens)? {
        Value::Object(map) => map
            .remove(&last)
            .map(|_| ())
            .ok_or_else(|| format!("member {:?} does not exist", last)),
        Value::Array(items) => {
            let index = parse_index(&last)?;
            if index >= items.len() {
                return Err(format!(
                    "remove index {} out of bounds (len {})",
                    index,
                    items.len()
                ));
            }
            items.remove(index);
            Ok(())
        }
        other => Err(format!("cannot remove a member of {}", kind(other))),
    }
}

fn replace(doc: &mut Value, path: &str, value: Value) -> std::result::Result<(), String> {
    let tokens = parse_pointer(path)?;
    let target = resolve_mut(doc, &tokens)?;
    *target = value;
    Ok(())
}

/// Walk tokens down to an existing value.
fn resolve_mut<'a>(
    doc: &'a mut Value,
    tokens: &[String],
) -> std::result::Result<&'a mut Value, String> {
    let mut target = doc;
    for token in tokens {
        target = match target {
            Value::Object(map) => map
                .get_mut(token)
                .ok_or_else(|| format!("member {:?} does not exist", token))?,
            Value::Array(items) => {
                let index = parse_index(token)?;
                let len = items.len();
                items
                    .get_mut(index)
                    .ok_or_else(|| format!("index {} out of bounds (len {})", index, len))?
            }
            other => return Err(format!("cannot descend into {}", kind(other))),
        };
    }
    Ok(target)
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
