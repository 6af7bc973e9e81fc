//! Error types for the turn journal.

use crate::types::{Hash, SlotId};
use thiserror::Error;

/// Main error type for journal and persistence operations.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Patch operation {op_index} at {path:?} failed: {reason}")]
    PatchApplication {
        op_index: usize,
        path: String,
        reason: String,
    },

    #[error("No keyframe precedes turn {turn}")]
    MissingKeyframe { turn: u64 },

    #[error("Out of order turn: expected {expected}, got {got}")]
    OutOfOrderTurn { expected: u64, got: u64 },

    #[error("Turn not found: {0}")]
    TurnNotFound(u64),

    #[error("Storage write to slot {slot} failed: {reason}")]
    StorageWrite { slot: SlotId, reason: String },

    #[error("Save slot not found: {0}")]
    SlotNotFound(SlotId),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Hash mismatch: expected {expected}, got {got}")]
    HashMismatch { expected: Hash, got: Hash },

    #[error("Save directory is locked by another process")]
    Locked,

    #[error("Save directory not initialized")]
    NotInitialized,

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<serde_json::Error> for JournalError {
    fn from(e: serde_json::Error) -> Self {
        JournalError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for JournalError {
    fn from(e: rmp_serde::encode::Error) -> Self {
        JournalError::Serialization(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for JournalError {
    fn from(e: rmp_serde::decode::Error) -> Self {
        JournalError::Deserialization(e.to_string())
    }
}

/// Result type for journal operations.
pub type Result<T> = std::result::Result<T, JournalError>;
