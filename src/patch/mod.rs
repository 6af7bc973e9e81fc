//! Structural diff and patch over JSON documents.
//!
//! Patches are ordered lists of `add` / `remove` / `replace` operations
//! addressed by JSON Pointer paths. The wire shape matches JSON Patch so
//! external tooling can read them, but `move`, `copy` and `test` are never
//! produced or accepted.
//!
//! The invariant the rest of the crate leans on:
//!
//! ```ignore
//! let patch = diff(&prev, &next);
//! assert_eq!(apply_patch(&prev, &patch)?, next);
//! ```

mod apply;
mod diff;
mod operations;
mod pointer;

pub use apply::{apply_patch, apply_to_sequence};
pub use diff::{diff, diff_sequences};
pub use operations::{Patch, PatchOperation};
pub use pointer::{escape_token, parse_pointer, push_token};
