//! Failure-safe persistent key-value store adapters
//!
//! The opener and callback contexts cannot share references, so all
//! correlation between them flows through serialized values in a per-origin
//! persistent store. Implementations absorb every underlying failure (quota
//! exceeded, disabled storage, unreadable file) and degrade to `None`/`false`
//! so the handshake reports `storage_error` instead of crashing.

mod file;
pub mod keys;
mod memory;
mod store;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::KeyValueStore;
