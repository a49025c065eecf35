//! # Shutdown intent persistence.
//!
//! Before tearing components down (non-emergency only, and only when
//! `save_state_on_shutdown` is set) the coordinator writes a
//! [`ShutdownSnapshot`] through a [`StateStore`], so the next start can tell a
//! clean shutdown from a crash.
//!
//! [`JsonFileStore`] writes the snapshot as pretty JSON, via a temporary file
//! renamed into place.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// What is persisted when a shutdown starts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShutdownSnapshot {
    /// Shutdown reason.
    pub reason: String,
    /// Emergency flag.
    pub emergency: bool,
    /// Wall-clock time the shutdown was initiated.
    pub initiated_at: SystemTime,
    /// Registered components in teardown order.
    pub components: Vec<String>,
}

/// Persists shutdown snapshots.
pub trait StateStore: Send + Sync + 'static {
    /// Writes the snapshot, replacing any previous one.
    fn save(&self, snapshot: &ShutdownSnapshot) -> Result<(), StoreError>;

    /// Reads the last snapshot, if any.
    fn load(&self) -> Result<Option<ShutdownSnapshot>, StoreError>;
}

/// JSON file store.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Target file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    fn save(&self, snapshot: &ShutdownSnapshot) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(snapshot)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> Result<Option<ShutdownSnapshot>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> ShutdownSnapshot {
        ShutdownSnapshot {
            reason: "signal:SIGTERM".into(),
            emergency: false,
            initiated_at: SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000),
            components: vec!["cycle".into(), "monitor".into()],
        }
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("state/shutdown.json"));
        assert_eq!(store.load().unwrap(), None);

        store.save(&snapshot()).unwrap();
        assert_eq!(store.load().unwrap(), Some(snapshot()));
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn corrupt_file_is_an_encoding_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shutdown.json");
        fs::write(&path, b"{not json").unwrap();
        let err = JsonFileStore::new(path).load().unwrap_err();
        assert_eq!(err.as_label(), "store_encoding");
    }
}
