//! Key-value store trait

use tokio::sync::watch;

/// Per-origin persistent key-value storage.
///
/// All operations are infallible at the type level: implementations catch and
/// absorb underlying storage exceptions, returning `None`/`false` instead of
/// propagating. Callers decide whether a `false` is fatal (it is when
/// persisting the CSRF state).
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if missing or the store is unavailable.
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, `false` if the store rejected the write.
    fn set(&self, key: &str, value: &str) -> bool;

    /// Remove a value, `false` if the store is unavailable.
    fn remove(&self, key: &str) -> bool;

    /// Change notification — the storage-event analog.
    ///
    /// The receiver observes a counter that bumps on every successful
    /// mutation. Returns `None` when the backing store cannot signal changes
    /// (callers then rely on their fallback poll alone).
    fn subscribe(&self) -> Option<watch::Receiver<u64>> {
        None
    }
}
