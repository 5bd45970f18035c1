//! Key/value store tiers backing the user cache.
//!
//! The collection manager only sees [`KeyValueStore`], so the persistence
//! tier (process memory, files on disk, or nothing at all) can be swapped
//! through configuration without touching it.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Extension used for every file written by `FileStore`
const FILE_EXTENSION: &str = "json";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StoreError {
    #[error("Invalid store key: {0:?}")]
    InvalidKey(String),
}

/// Byte-oriented key/value storage.
///
/// Reads and writes are synchronous; a store has a single owner.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn set(&mut self, key: &str, value: &[u8]) -> Result<()>;
    /// Removing an absent key is not an error.
    fn remove(&mut self, key: &str) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
}

// ============================================================================
// Tiers
// ============================================================================

/// Which store implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageTier {
    /// Lives as long as the process
    Memory,
    /// Files under the cache directory, kept until explicitly cleared
    #[default]
    File,
    /// Nothing is kept; every read misses
    None,
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageTier::Memory => write!(f, "memory"),
            StorageTier::File => write!(f, "file"),
            StorageTier::None => write!(f, "none"),
        }
    }
}

impl FromStr for StorageTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "session" => Ok(StorageTier::Memory),
            "file" | "disk" => Ok(StorageTier::File),
            "none" | "off" => Ok(StorageTier::None),
            other => Err(format!(
                "unknown storage tier '{}' (expected memory, file or none)",
                other
            )),
        }
    }
}

/// Open the store for `tier`. `dir` is only used by the file tier.
pub fn open_store(tier: StorageTier, dir: &Path) -> Result<Box<dyn KeyValueStore>> {
    debug!(%tier, ?dir, "Opening store");
    Ok(match tier {
        StorageTier::Memory => Box::new(MemoryStore::new()),
        StorageTier::File => Box::new(FileStore::new(dir.to_path_buf())?),
        StorageTier::None => Box::new(NullStore),
    })
}

// ============================================================================
// Memory
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }
}

// ============================================================================
// Files
// ============================================================================

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create store directory: {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Keys become file names, so only a conservative character set is allowed.
    fn key_path(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()).into());
        }
        Ok(self.dir.join(format!("{}.{}", key, FILE_EXTENSION)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.key_path(key)?;
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read(&path)
            .with_context(|| format!("Failed to read store file: {}", key))?;
        Ok(Some(contents))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let path = self.key_path(key)?;
        std::fs::write(&path, value)
            .with_context(|| format!("Failed to write store file: {}", key))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        let path = self.key_path(key)?;
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove store file: {}", key))?;
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list store directory: {}", self.dir.display()))?;

        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == FILE_EXTENSION) {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Nothing
// ============================================================================

#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl KeyValueStore for NullStore {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn set(&mut self, _key: &str, _value: &[u8]) -> Result<()> {
        Ok(())
    }

    fn remove(&mut self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        Ok(())
    }
}
