//! One-file-per-slot backend on the local filesystem.

use super::backend::{SaveBackend, SaveMeta, StoredSave};
use crate::error::{JournalError, Result};
use crate::types::SlotId;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Magic bytes for slot files.
const SAVE_MAGIC: &[u8; 4] = b"TJS\0";

/// Current slot file format version.
const SAVE_VERSION: u8 = 1;

/// Extension for slot files.
const SAVE_EXTENSION: &str = "sav";

/// Bytes around the body: magic, version, length, then the CRC32 trailer.
const SAVE_FRAMING_LEN: u64 = 4 + 1 + 8 + 4;

/// File backend configuration.
#[derive(Clone, Debug)]
pub struct FileBackendConfig {
    /// Directory holding one file per slot.
    pub path: PathBuf,

    /// Whether to create the directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./saves"),
            create_if_missing: true,
        }
    }
}

/// Body of a slot file.
#[derive(Serialize, Deserialize)]
struct SlotFile {
    slot: SlotId,
    save: StoredSave,
}

/// Stores each slot as `<dir>/<slot>.sav`.
///
/// File layout: magic, version, body length (u64 LE), MessagePack body,
/// CRC32 of the body (u32 LE). Writes go to a temporary file that is synced
/// and renamed over the old one.
pub struct FileBackend {
    config: FileBackendConfig,

    /// Lock file for exclusive access.
    _lock_file: File,
}

impl FileBackend {
    pub fn open(config: FileBackendConfig) -> Result<Self> {
        if !config.path.exists() {
            if config.create_if_missing {
                fs::create_dir_all(&config.path)?;
            } else {
                return Err(JournalError::NotInitialized);
            }
        }

        let lock_file = Self::acquire_lock(&config.path)?;
        Ok(Self {
            config,
            _lock_file: lock_file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let lock_path = path.join("LOCK");
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;
        file.try_lock_exclusive().map_err(|_| JournalError::Locked)?;
        Ok(file)
    }

    /// File name for a slot. Ids outside `[A-Za-z0-9_-]` are hex-encoded.
    fn slot_path(&self, slot: &SlotId) -> PathBuf {
        let id = slot.as_str();
        let plain = !id.is_empty()
            && id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        let stem = if plain {
            id.to_string()
        } else {
            format!("x-{}", hex::encode(id.as_bytes()))
        };
        self.config.path.join(format!("{stem}.{SAVE_EXTENSION}"))
    }

    fn write_slot_file(path: &Path, body: &SlotFile) -> Result<()> {
        let encoded = rmp_serde::to_vec_named(body)?;
        let tmp_path = path.with_extension("tmp");

        {
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;

            file.write_all(SAVE_MAGIC)?;
            file.write_all(&[SAVE_VERSION])?;
            file.write_all(&(encoded.len() as u64).to_le_bytes())?;
            file.write_all(&encoded)?;
            file.write_all(&crc32fast::hash(&encoded).to_le_bytes())?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn read_slot_file(path: &Path) -> Result<SlotFile> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        file.read_exact(&mut magic)?;
        if &magic != SAVE_MAGIC {
            return Err(JournalError::InvalidFormat("Invalid save file magic".into()));
        }

        let mut version = [0u8; 1];
        file.read_exact(&mut version)?;
        if version[0] != SAVE_VERSION {
            return Err(JournalError::InvalidFormat(format!(
                "Unsupported save file version: {}",
                version[0]
            )));
        }

        let mut len_bytes = [0u8; 8];
        file.read_exact(&mut len_bytes)?;
        let len = u64::from_le_bytes(len_bytes);

        let body_len = file.metadata()?.len().saturating_sub(SAVE_FRAMING_LEN);
        if len != body_len {
            return Err(JournalError::InvalidFormat(format!(
                "Save file body length {} does not match header length {}",
                body_len, len
            )));
        }

        let mut encoded = vec![0u8; body_len as usize];
        file.read_exact(&mut encoded)?;

        let mut checksum_bytes = [0u8; 4];
        file.read_exact(&mut checksum_bytes)?;
        let stored = u32::from_le_bytes(checksum_bytes);
        let computed = crc32fast::hash(&encoded);
        if stored != computed {
            return Err(JournalError::ChecksumMismatch {
                expected: stored,
                got: computed,
            });
        }

        Ok(rmp_serde::from_slice(&encoded)?)
    }
}

impl SaveBackend for FileBackend {
    fn get(&self, slot: &SlotId) -> Result<Option<StoredSave>> {
        let path = self.slot_path(slot);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(Self::read_slot_file(&path)?.save))
    }

    fn put(&self, slot: &SlotId, save: StoredSave) -> Result<SlotId> {
        let body = SlotFile {
            slot: slot.clone(),
            save,
        };
        Self::write_slot_file(&self.slot_path(slot), &body)?;
        Ok(slot.clone())
    }

    fn delete(&self, slot: &SlotId) -> Result<()> {
        let path = self.slot_path(slot);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<SaveMeta>> {
        let mut metas = Vec::new();

        for entry in fs::read_dir(&self.config.path)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(SAVE_EXTENSION) {
                continue;
            }
            match Self::read_slot_file(&path) {
                Ok(body) => metas.push(body.save.meta(&body.slot)),
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable save");
                }
            }
        }

        metas.sort_by(|a, b| a.slot.cmp(&b.slot));
        Ok(metas)
    }
}
