//! Durable key/value storage.
//!
//! Values are JSON files in a per-application directory:
//!   - Linux: `~/.config/storedesk/`
//!   - macOS: `~/Library/Application Support/storedesk/`
//!   - Windows: `%APPDATA%\storedesk\`
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! reader sees either the previous value or the new one, never a mix.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

const APP_DIR: &str = "storedesk";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no config directory available on this platform")]
    NoConfigDir,
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("storage serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Handle on a storage directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    /// Storage rooted at an explicit directory (created lazily on first write).
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Storage in the platform config directory.
    pub fn default_location() -> Result<Self, StorageError> {
        let config_dir = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
        Ok(Self::at(config_dir.join(APP_DIR)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Save a value, replacing any previous value atomically.
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        fs::create_dir_all(&self.dir)?;

        let path = self.file_path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Load a value.
    ///
    /// Returns `None` if the key doesn't exist or deserialization fails.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let json = fs::read_to_string(self.file_path(key)).ok()?;
        match serde_json::from_str(&json) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("Ignoring unreadable stored value '{}': {}", key, e);
                None
            }
        }
    }

    /// Remove a value. Missing keys are not an error.
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.file_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a key exists in storage.
    pub fn exists(&self, key: &str) -> bool {
        self.file_path(key).exists()
    }

    fn file_path(&self, key: &str) -> PathBuf {
        // Sanitize key to be a valid filename
        let safe_key = key.replace(['/', '\\', ':', '*', '?', '"', '<', '>', '|'], "_");
        self.dir.join(format!("{}.json", safe_key))
    }
}
