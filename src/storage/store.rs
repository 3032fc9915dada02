//! Item Store Contract
//!
//! The command layer talks to storage only through [`ItemStore`]. Single-step
//! operations (`lookup`, `create`, `insert`, `remove`, `bump_cas`,
//! `invalidate_before`) are available directly on the store.
//!
//! Anything that reads a key and then conditionally writes it must go through
//! [`ItemStore::with_slot`]. The closure receives a [`Slot`] bound to one key
//! while the store holds that key exclusively, so a lookup-compare-write
//! sequence cannot interleave with another writer on the same key:
//!
//! ```text
//!   with_slot(key) ──> lock ──> f(&mut slot) ──> unlock
//!                                 │
//!                                 ├─ slot.item()      current version
//!                                 ├─ slot.create(..)  stage a new version
//!                                 ├─ slot.insert(..)  publish it
//!                                 └─ slot.remove()
//! ```

use crate::storage::item::Item;
use bytes::Bytes;
use thiserror::Error;

/// Errors reported by an item store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The item could not be allocated within the store's memory limits
    #[error("out of memory: requested {requested} bytes ({available} available)")]
    OutOfMemory { requested: usize, available: usize },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Exclusive access to a single key inside an [`ItemStore`].
///
/// Every method acts on the key the slot was opened for.
pub trait Slot {
    /// The live item currently stored under this key.
    fn item(&self) -> Option<&Item>;

    /// Allocates a new opaque item for this key with a fresh CAS.
    ///
    /// The item is not visible until passed to [`Slot::insert`]. Memory held
    /// by the current item is counted as reclaimable.
    fn create(&mut self, value: Bytes, flags: u32, expiration: u32) -> StoreResult<Item>;

    /// Allocates a new counter item holding `initial`.
    fn create_counter(&mut self, initial: u64, expiration: u32) -> StoreResult<Item>;

    /// Stores `item`, replacing any current version. Returns its CAS.
    fn insert(&mut self, item: Item) -> u64;

    /// Removes the current item. Returns `true` if one was present.
    fn remove(&mut self) -> bool;

    /// Assigns the current item a new, strictly greater CAS.
    fn bump_cas(&mut self) -> Option<u64>;

    /// Rewrites the value of a counter item in place, keeping its CAS.
    ///
    /// Returns `false` if there is no counter-shaped item under this key.
    fn store_counter(&mut self, value: u64) -> bool;
}

/// A keyed store of cache items shared by all connections.
pub trait ItemStore: Send + Sync {
    /// Returns a copy of the live item for `key`.
    fn lookup(&self, key: &[u8]) -> Option<Item>;

    /// Allocates a new opaque item with a fresh CAS without inserting it.
    fn create(&self, key: Bytes, value: Bytes, flags: u32, expiration: u32) -> StoreResult<Item>;

    /// Upserts `item`. Returns its CAS.
    fn insert(&self, item: Item) -> u64;

    /// Removes `key`. Returns `true` if an item existed.
    fn remove(&self, key: &[u8]) -> bool;

    /// Assigns the item under `key` a new, strictly greater CAS.
    fn bump_cas(&self, key: &[u8]) -> Option<u64>;

    /// Logically deletes every item last modified before `when`.
    ///
    /// `0` means now; other values follow the expiration convention, so a
    /// flush can be scheduled for later.
    fn invalidate_before(&self, when: u32);

    /// Runs `f` with exclusive access to `key`.
    fn with_slot<T, F>(&self, key: &Bytes, f: F) -> T
    where
        F: FnOnce(&mut dyn Slot) -> T;
}
