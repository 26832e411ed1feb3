//! JSON-file-backed store for hosts without a native per-origin storage

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::store::KeyValueStore;

/// Key-value store persisted as a single JSON object on disk.
///
/// Desktop/webview hosts point this at a file in their data directory so the
/// persisted handshake state survives navigation of the destination context.
/// Every IO or parse failure is absorbed: reads fall back to the last known
/// in-memory snapshot and writes report `false`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
    version_tx: watch::Sender<u64>,
}

impl FileStore {
    /// Open a store at `path`, loading any existing snapshot.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = Self::load_snapshot(&path);
        let (version_tx, _) = watch::channel(0);
        Self {
            path,
            cache: Mutex::new(cache),
            version_tx,
        }
    }

    fn load_snapshot(path: &Path) -> HashMap<String, String> {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Ignoring unreadable store snapshot at {:?}: {}", path, e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        }
    }

    /// Persist the cache; `false` when the write fails.
    fn flush(&self, cache: &HashMap<String, String>) -> bool {
        let json = match serde_json::to_string(cache) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize store snapshot: {}", e);
                return false;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Failed to create store directory {:?}: {}", parent, e);
                return false;
            }
        }

        match std::fs::write(&self.path, json) {
            Ok(()) => true,
            Err(e) => {
                warn!("Failed to write store snapshot to {:?}: {}", self.path, e);
                false
            }
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        let mut cache = self.cache.lock();
        cache.insert(key.to_string(), value.to_string());
        let ok = self.flush(&cache);
        drop(cache);
        if ok {
            debug!("Persisted store key: {}", key);
            self.version_tx.send_modify(|v| *v += 1);
        }
        ok
    }

    fn remove(&self, key: &str) -> bool {
        let mut cache = self.cache.lock();
        if cache.remove(key).is_none() {
            return true;
        }
        let ok = self.flush(&cache);
        drop(cache);
        if ok {
            self.version_tx.send_modify(|v| *v += 1);
        }
        ok
    }

    fn subscribe(&self) -> Option<watch::Receiver<u64>> {
        Some(self.version_tx.subscribe())
    }
}
