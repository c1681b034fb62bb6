//! # SyncInfo Storage
//!
//! Local persistence for the account's SyncInfo document.
//!
//! Exactly one writer exists per process; the store is a cached copy of
//! the document behind a lock, flushed to disk after every mutation. Tests
//! and ephemeral contexts run the store memory-only.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SYNCINFO STORE                                     │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  open(path)   missing file  → defaults (first run)                     │
//! │               corrupt file  → defaults, logged (never fatal)           │
//! │               valid file    → parsed + repaired                        │
//! │                                                                         │
//! │  update(f)    mutate under the lock, persist, return the new value     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::sync::SyncInfo;

/// Cached, optionally file-backed SyncInfo storage.
pub struct SyncInfoStore {
    /// Backing file; `None` keeps the store memory-only.
    path: Option<PathBuf>,

    /// The current document. Single writer per process; the lock is for
    /// readers on other tasks.
    current: RwLock<SyncInfo>,
}

impl SyncInfoStore {
    /// Memory-only store (tests, ephemeral sessions).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            current: RwLock::new(SyncInfo::default()),
        }
    }

    /// Open a file-backed store.
    ///
    /// A missing file means first run; a corrupt one is logged and
    /// replaced with defaults on the next persist.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let info = match std::fs::read_to_string(&path) {
            Ok(raw) => SyncInfo::load_or_default(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => SyncInfo::default(),
            Err(e) => {
                tracing::warn!(
                    "Could not read sync configuration from {}: {}; using defaults",
                    path.display(),
                    e
                );
                SyncInfo::default()
            }
        };

        Self {
            path: Some(path),
            current: RwLock::new(info),
        }
    }

    /// A copy of the current document.
    pub fn get(&self) -> SyncInfo {
        self.current.read().clone()
    }

    /// Replace the document (e.g. with a merge result) and persist it.
    pub fn set(&self, mut info: SyncInfo) -> Result<SyncInfo> {
        info.repair();
        self.persist(&info)?;
        *self.current.write() = info.clone();
        Ok(info)
    }

    /// Mutate the document in place and persist the result.
    pub fn update<F>(&self, mutate: F) -> Result<SyncInfo>
    where
        F: FnOnce(&mut SyncInfo),
    {
        let mut info = self.current.read().clone();
        mutate(&mut info);
        self.set(info)
    }

    fn persist(&self, info: &SyncInfo) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let raw = info.serialize()?;
        std::fs::write(path, raw).map_err(|e| {
            Error::StorageWriteError(format!("{}: {}", path.display(), e))
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store_round_trip() {
        let store = SyncInfoStore::in_memory();
        assert!(!store.get().e2ee_enabled());

        store.update(|info| info.set_e2ee_enabled(true)).unwrap();
        assert!(store.get().e2ee_enabled());
    }

    #[test]
    fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syncinfo.json");

        let store = SyncInfoStore::open(&path);
        store
            .update(|info| {
                info.set_e2ee_enabled(true);
                info.set_app_min_version("2.8.0");
            })
            .unwrap();

        let reopened = SyncInfoStore::open(&path);
        let info = reopened.get();
        assert!(info.e2ee_enabled());
        assert_eq!(info.app_min_version(), "2.8.0");
        assert!(info.structurally_equals(&store.get()));
    }

    #[test]
    fn test_missing_file_is_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = SyncInfoStore::open(dir.path().join("never-written.json"));
        assert!(store.get().structurally_equals(&SyncInfo::default()));
    }

    #[test]
    fn test_corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("syncinfo.json");
        std::fs::write(&path, "{{{ definitely not json").unwrap();

        let store = SyncInfoStore::open(&path);
        assert!(store.get().structurally_equals(&SyncInfo::default()));
    }

    #[test]
    fn test_set_repairs_before_persisting() {
        let store = SyncInfoStore::in_memory();

        let mut info = SyncInfo::default();
        info.set_active_master_key_id("dangling");
        let stored = store.set(info).unwrap();

        assert_eq!(stored.active_master_key_id(), "");
        assert_eq!(store.get().active_master_key_id(), "");
    }
}
