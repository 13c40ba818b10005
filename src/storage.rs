//! Durable key-value slots backing the route cache.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::traits::KeyValueSlot;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded: {needed} bytes needed, {quota} bytes allowed")]
    QuotaExceeded { needed: usize, quota: usize },
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// In-memory slot with an optional byte quota.
///
/// `fail_next_saves` makes the next N saves report a quota failure
/// regardless of size; `fail_next_removes` does the same for removals.
#[derive(Debug, Clone, Default)]
pub struct MemorySlot {
    values: HashMap<String, String>,
    quota: Option<usize>,
    forced_failures: usize,
    forced_remove_failures: usize,
    saves: usize,
}

impl MemorySlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// Pre-populates a slot, e.g. to simulate data from a previous run.
    pub fn with_value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn fail_next_saves(&mut self, count: usize) {
        self.forced_failures = count;
    }

    pub fn fail_next_removes(&mut self, count: usize) {
        self.forced_remove_failures = count;
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl KeyValueSlot for MemorySlot {
    fn load(&self, name: &str) -> Result<Option<String>, StorageError> {
        Ok(self.values.get(name).cloned())
    }

    fn save(&mut self, name: &str, value: &str) -> Result<(), StorageError> {
        if self.forced_failures > 0 {
            self.forced_failures -= 1;
            return Err(StorageError::QuotaExceeded {
                needed: value.len(),
                quota: self.quota.unwrap_or(0),
            });
        }
        if let Some(quota) = self.quota {
            let others: usize = self
                .values
                .iter()
                .filter(|(key, _)| key.as_str() != name)
                .map(|(key, stored)| key.len() + stored.len())
                .sum();
            let needed = others + name.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }
        self.values.insert(name.to_string(), value.to_string());
        self.saves += 1;
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        if self.forced_remove_failures > 0 {
            self.forced_remove_failures -= 1;
            return Err(io::Error::other(format!("slot {name} is locked")).into());
        }
        self.values.remove(name);
        Ok(())
    }
}

/// One file per slot name under `root`, with a byte quota per value.
#[derive(Debug, Clone)]
pub struct FileSlot {
    root: PathBuf,
    quota: usize,
}

impl FileSlot {
    /// Default per-slot quota, matching typical browser storage limits.
    pub const DEFAULT_QUOTA: usize = 5 * 1024 * 1024;

    pub fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        Self::with_quota(root, Self::DEFAULT_QUOTA)
    }

    pub fn with_quota(root: impl Into<PathBuf>, quota: usize) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root, quota })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slot_path(&self, name: &str) -> PathBuf {
        let file_name: String = name
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
            .collect();
        self.root.join(format!("{file_name}.slot"))
    }
}

impl KeyValueSlot for FileSlot {
    fn load(&self, name: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.slot_path(name)) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&mut self, name: &str, value: &str) -> Result<(), StorageError> {
        if value.len() > self.quota {
            return Err(StorageError::QuotaExceeded {
                needed: value.len(),
                quota: self.quota,
            });
        }
        let path = self.slot_path(name);
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, value)?;
        fs::rename(tmp_path, path)?;
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.slot_path(name)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
