//! Durable storage for the item collection
//!
//! The collection is always loaded and written wholesale. `JsonFileStore`
//! writes to a temp file in the same directory and renames it over the
//! target so a crash mid-write never leaves a torn file behind.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::error::PersistenceError;
use crate::item::Item;

/// Storage backend for the Item Store
pub trait Persistence: Send + Sync {
    /// Read back the whole collection
    fn load(&self) -> Result<Vec<Item>, PersistenceError>;

    /// Replace the stored collection with `items`
    fn save(&self, items: &[Item]) -> Result<(), PersistenceError>;
}

/// Pretty-printed JSON array on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self, attempt: u32) -> PathBuf {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let base = self
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("items.json");
        dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), attempt))
    }
}

impl Persistence for JsonFileStore {
    fn load(&self) -> Result<Vec<Item>, PersistenceError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{} not found, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, items: &[Item]) -> Result<(), PersistenceError> {
        let content = serde_json::to_string_pretty(items)?;

        let mut attempt = 0u32;
        let tmp_path = loop {
            let candidate = self.temp_path(attempt);
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(mut tmp) => {
                    let written = tmp
                        .write_all(content.as_bytes())
                        .and_then(|_| tmp.flush())
                        .and_then(|_| tmp.sync_all());
                    if let Err(e) = written {
                        let _ = fs::remove_file(&candidate);
                        return Err(e.into());
                    }
                    break candidate;
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    attempt = attempt.saturating_add(1);
                }
                Err(e) => return Err(e.into()),
            }
        };

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        // Best-effort fsync of the directory so the rename itself survives
        if let Some(dir) = self.path.parent() {
            if let Ok(dir_file) = File::open(dir) {
                let _ = dir_file.sync_all();
            }
        }

        debug!("Saved {} items to {}", items.len(), self.path.display());
        Ok(())
    }
}

/// In-process storage with no durability
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<Vec<Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing collection
    pub fn with_items(items: Vec<Item>) -> Self {
        Self {
            items: Mutex::new(items),
        }
    }
}

impl Persistence for MemoryStore {
    fn load(&self) -> Result<Vec<Item>, PersistenceError> {
        let items = self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(items.clone())
    }

    fn save(&self, items: &[Item]) -> Result<(), PersistenceError> {
        let mut stored = self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *stored = items.to_vec();
        Ok(())
    }
}
