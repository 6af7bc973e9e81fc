//! Patch operation types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single structural operation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    /// Insert into an object (overwriting) or an array (shifting).
    Add { path: String, value: Value },

    /// Remove an existing object member or array element.
    Remove { path: String },

    /// Overwrite an existing value. The empty path replaces the document.
    Replace { path: String, value: Value },
}

impl PatchOperation {
    pub fn path(&self) -> &str {
        match self {
            PatchOperation::Add { path, .. }
            | PatchOperation::Remove { path }
            | PatchOperation::Replace { path, .. } => path,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PatchOperation::Add { .. } => "add",
            PatchOperation::Remove { .. } => "remove",
            PatchOperation::Replace { .. } => "replace",
        }
    }
}

/// Ordered, directional (prev -> next) list of operations.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(pub Vec<PatchOperation>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: PatchOperation) {
        self.0.push(op);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PatchOperation> {
        self.0.iter()
    }

    /// Serialized JSON size in bytes.
    pub fn encoded_len(&self) -> usize {
        serde_json::to_vec(self).map(|v| v.len()).unwrap_or(0)
    }
}

impl From<Vec<PatchOperation>> for Patch {
    fn from(ops: Vec<PatchOperation>) -> Self {
        Patch(ops)
    }
}

impl<'a> IntoIterator for &'a Patch {
    type Item = &'a PatchOperation;
    type IntoIter = std::slice::Iter<'a, PatchOperation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let patch = Patch(vec![
            PatchOperation::Add {
                path: "/a".into(),
                value: json!(1),
            },
            PatchOperation::Remove { path: "/b/0".into() },
            PatchOperation::Replace {
                path: "".into(),
                value: json!(null),
            },
        ]);

        let wire = serde_json::to_value(&patch).unwrap();
        assert_eq!(
            wire,
            json!([
                {"op": "add", "path": "/a", "value": 1},
                {"op": "remove", "path": "/b/0"},
                {"op": "replace", "path": "", "value": null}
            ])
        );

        let parsed: Patch = serde_json::from_value(wire).unwrap();
        assert_eq!(parsed, patch);
    }

    #[test]
    fn test_move_is_rejected() {
        let wire = json!([{"op": "move", "from": "/a", "path": "/b"}]);
        assert!(serde_json::from_value::<Patch>(wire).is_err());
    }

    #[test]
    fn test_accessors() {
        let op = PatchOperation::Remove { path: "/x".into() };
        assert_eq!(op.path(), "/x");
        assert_eq!(op.name(), "remove");
        assert!(Patch::new().is_empty());
    }
}
