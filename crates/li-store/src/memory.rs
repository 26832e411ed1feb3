//! In-memory store for same-process contexts and tests

use std::collections::HashMap;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::store::KeyValueStore;

/// In-memory key-value store with change notification.
///
/// Used when the opener and callback contexts run in the same process (an
/// embedded webview host relaying through shared state) and as the test
/// double for every storage-backed scenario.
#[derive(Debug)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
    version_tx: watch::Sender<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (version_tx, _) = watch::channel(0);
        Self {
            values: RwLock::new(HashMap::new()),
            version_tx,
        }
    }

    fn bump(&self) {
        self.version_tx.send_modify(|v| *v += 1);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> bool {
        self.values
            .write()
            .insert(key.to_string(), value.to_string());
        self.bump();
        true
    }

    fn remove(&self, key: &str) -> bool {
        let removed = self.values.write().remove(key).is_some();
        if removed {
            self.bump();
        }
        true
    }

    fn subscribe(&self) -> Option<watch::Receiver<u64>> {
        Some(self.version_tx.subscribe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let store = MemoryStore::new();
        assert!(store.get("missing").is_none());

        assert!(store.set("key", "value"));
        assert_eq!(store.get("key").as_deref(), Some("value"));

        assert!(store.remove("key"));
        assert!(store.get("key").is_none());
    }

    #[test]
    fn test_overwrite() {
        let store = MemoryStore::new();
        store.set("key", "first");
        store.set("key", "second");
        assert_eq!(store.get("key").as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_subscribe_observes_mutations() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe().unwrap();
        let initial = *rx.borrow_and_update();

        store.set("key", "value");
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update() > initial);

        store.remove("key");
        rx.changed().await.unwrap();
    }

    #[test]
    fn test_remove_missing_is_not_an_error() {
        let store = MemoryStore::new();
        assert!(store.remove("never-set"));
    }
}
