//! Sharded In-Memory Item Store
//!
//! This module implements [`StorageEngine`], the in-memory [`ItemStore`] used by
//! FlashMC. It is a thread-safe, concurrent HashMap of cache items with
//! memcached-style expiration, CAS allocation and flush support.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, keys are spread over 64 shards.
//! 2. **Slots**: Read-modify-write sequences run under the shard's write lock,
//!    which makes them atomic per key.
//! 3. **Global CAS Counter**: Every new version draws from one `AtomicU64`, so
//!    CAS values never repeat and always grow for a given key.
//! 4. **Lazy Expiry**: Expired and flushed items are dropped when touched, and
//!    the background sweeper reclaims the rest.
//! 5. **Memory Limit**: Allocation fails with `OutOfMemory` instead of evicting.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! │        next_cas · used_memory · flush_deadline              │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::storage::item::{encode_counter, resolve_time, Item, ValueShape, MAX_KEY_LENGTH};
use crate::storage::store::{ItemStore, Slot, StoreError, StoreResult};
use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, trace};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// Memory limits for a [`StorageEngine`].
///
/// `max_memory` is checked against a shared counter without a global lock.
/// Writers racing on different shards can each pass the check, so the limit
/// may be overshot by up to one item per concurrent writer.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Total bytes the engine may hold, including per-item overhead (default: 64 MiB)
    pub max_memory: usize,

    /// Largest value a single item may carry (default: 1 MiB)
    pub max_item_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_memory: 64 * 1024 * 1024,
            max_item_size: 1024 * 1024,
        }
    }
}

type ItemMap = HashMap<Bytes, Item>;

/// A single shard containing a portion of the items.
#[derive(Debug)]
struct Shard {
    items: RwLock<ItemMap>,
}

impl Shard {
    fn new() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }

    // A panicking closure inside `with_slot` must not take the shard down with it.
    fn read(&self) -> RwLockReadGuard<'_, ItemMap> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ItemMap> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The in-memory item store.
///
/// Designed to be wrapped in an `Arc` and shared by every connection's
/// command handler. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use flashmc::storage::{ItemStore, StorageEngine};
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// let item = engine
///     .create(Bytes::from("name"), Bytes::from("Ariz"), 0, 0)
///     .unwrap();
/// let cas = engine.insert(item);
///
/// let found = engine.lookup(b"name").unwrap();
/// assert_eq!(found.value(), &Bytes::from("Ariz"));
/// assert_eq!(found.cas(), cas);
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,

    config: EngineConfig,

    /// Last CAS handed out (0 is never assigned)
    next_cas: AtomicU64,

    /// Number of items currently stored (approximate)
    key_count: AtomicU64,

    /// Bytes held by stored items, including overhead
    used_memory: AtomicUsize,

    /// Flush deadlines that decide which items a flush has caught
    flush_deadline: RwLock<FlushWindow>,
}

/// The flush deadlines in effect.
///
/// A later flush replaces `pending`, but a deadline that was already reached
/// stays in `reached`, so items it caught never come back.
#[derive(Debug, Clone, Copy, Default)]
struct FlushWindow {
    /// Latest deadline that has passed
    reached: Option<Instant>,
    /// Deadline still in the future when it was scheduled
    pending: Option<Instant>,
}

impl FlushWindow {
    /// Returns true if an item modified at `modified_at` is dead as of `now`.
    fn invalidates(&self, modified_at: Instant, now: Instant) -> bool {
        let caught_by = |deadline: Instant| modified_at < deadline;

        self.reached.is_some_and(caught_by)
            || self
                .pending
                .is_some_and(|deadline| now >= deadline && caught_by(deadline))
    }

    /// Installs a new deadline, keeping any deadline that already passed.
    fn schedule(&mut self, deadline: Instant, now: Instant) {
        if let Some(previous) = self.pending.take() {
            if previous <= now {
                self.reach(previous);
            }
        }

        if deadline <= now {
            self.reach(deadline);
        } else {
            self.pending = Some(deadline);
        }
    }

    fn reach(&mut self, deadline: Instant) {
        self.reached = Some(self.reached.map_or(deadline, |current| current.max(deadline)));
    }
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("used_memory", &self.used_memory.load(Ordering::Relaxed))
            .field("max_memory", &self.config.max_memory)
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new storage engine with default limits.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates a new storage engine with the given limits.
    pub fn with_config(config: EngineConfig) -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::new()).collect();

        Self {
            shards,
            config,
            next_cas: AtomicU64::new(0),
            key_count: AtomicU64::new(0),
            used_memory: AtomicUsize::new(0),
            flush_deadline: RwLock::new(FlushWindow::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Returns the approximate number of items in the store.
    ///
    /// Expired items count until they are touched or swept.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the bytes currently accounted to stored items.
    pub fn used_memory(&self) -> usize {
        self.used_memory.load(Ordering::Relaxed)
    }

    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    #[inline]
    fn next_cas(&self) -> u64 {
        self.next_cas.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn flush_deadline(&self) -> FlushWindow {
        *self
            .flush_deadline
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// An item is live if it has not expired and was not caught by a flush.
    #[inline]
    fn is_live(item: &Item, now: Instant, flush: FlushWindow) -> bool {
        !item.is_expired_at(now) && !flush.invalidates(item.modified_at, now)
    }

    /// Builds a new item after checking it fits the memory limits.
    ///
    /// `reclaimable` is the footprint of the item this one will replace.
    fn allocate(
        &self,
        key: Bytes,
        value: Bytes,
        flags: u32,
        expiration: u32,
        shape: ValueShape,
        reclaimable: usize,
    ) -> StoreResult<Item> {
        debug_assert!(
            key.len() <= MAX_KEY_LENGTH,
            "key exceeds {MAX_KEY_LENGTH} bytes"
        );

        let requested = crate::storage::item::footprint(key.len(), value.len());

        if value.len() > self.config.max_item_size {
            debug!(
                key = ?key,
                size = value.len(),
                max = self.config.max_item_size,
                "Item larger than max item size"
            );
            return Err(StoreError::OutOfMemory {
                requested,
                available: self.config.max_item_size,
            });
        }

        // Approximate under concurrency: other shards may be mid-insert
        let used = self.used_memory().saturating_sub(reclaimable);
        let available = self.config.max_memory.saturating_sub(used);
        if requested > available {
            debug!(key = ?key, requested, available, "Memory limit reached");
            return Err(StoreError::OutOfMemory {
                requested,
                available,
            });
        }

        Ok(Item::new(
            key,
            value,
            flags,
            expiration,
            self.next_cas(),
            shape,
        ))
    }

    /// Inserts into a locked shard map, keeping the counters in sync.
    fn put(&self, items: &mut ItemMap, item: Item) -> u64 {
        let cas = item.cas;
        let added = item.footprint();

        match items.insert(item.key.clone(), item) {
            Some(old) => {
                self.used_memory.fetch_sub(old.footprint(), Ordering::Relaxed);
            }
            None => {
                self.key_count.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.used_memory.fetch_add(added, Ordering::Relaxed);

        cas
    }

    /// Removes from a locked shard map, keeping the counters in sync.
    fn take(&self, items: &mut ItemMap, key: &[u8]) -> Option<Item> {
        let item = items.remove(key)?;
        self.key_count.fetch_sub(1, Ordering::Relaxed);
        self.used_memory
            .fetch_sub(item.footprint(), Ordering::Relaxed);
        Some(item)
    }

    /// Drops the item under `key` if it is no longer live.
    fn purge_if_dead(&self, items: &mut ItemMap, key: &[u8], now: Instant, flush: FlushWindow) {
        let dead = items
            .get(key)
            .is_some_and(|item| !Self::is_live(item, now, flush));

        if dead {
            self.take(items, key);
            trace!(key = ?key, "Dropped stale item");
        }
    }

    /// Removes expired and flushed items from all shards.
    ///
    /// This is called by the background expiry sweeper and by an immediate
    /// flush.
    ///
    /// # Returns
    ///
    /// Returns the number of items that were reclaimed.
    pub fn cleanup_expired(&self) -> u64 {
        let now = Instant::now();
        let flush = self.flush_deadline();
        let mut cleaned = 0u64;
        let mut freed = 0usize;

        for shard in &self.shards {
            let mut items = shard.write();

            items.retain(|_, item| {
                let live = Self::is_live(item, now, flush);
                if !live {
                    cleaned += 1;
                    freed += item.footprint();
                }
                live
            });
        }

        if cleaned > 0 {
            self.key_count.fetch_sub(cleaned, Ordering::Relaxed);
            self.used_memory.fetch_sub(freed, Ordering::Relaxed);
        }

        cleaned
    }
}

impl ItemStore for StorageEngine {
    fn lookup(&self, key: &[u8]) -> Option<Item> {
        let now = Instant::now();
        let flush = self.flush_deadline();
        let shard = self.get_shard(key);

        // Fast path: read lock
        {
            let items = shard.read();
            match items.get(key) {
                Some(item) if Self::is_live(item, now, flush) => return Some(item.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Stale - need write lock to drop it
        let mut items = shard.write();
        self.purge_if_dead(&mut items, key, now, flush);
        // Race: another writer may have stored a fresh version meanwhile
        items.get(key).cloned()
    }

    fn create(&self, key: Bytes, value: Bytes, flags: u32, expiration: u32) -> StoreResult<Item> {
        self.allocate(key, value, flags, expiration, ValueShape::Opaque, 0)
    }

    fn insert(&self, item: Item) -> u64 {
        let mut items = self.get_shard(&item.key).write();
        self.put(&mut items, item)
    }

    fn remove(&self, key: &[u8]) -> bool {
        let now = Instant::now();
        let flush = self.flush_deadline();
        let mut items = self.get_shard(key).write();

        self.take(&mut items, key)
            .is_some_and(|item| Self::is_live(&item, now, flush))
    }

    fn bump_cas(&self, key: &[u8]) -> Option<u64> {
        let now = Instant::now();
        let flush = self.flush_deadline();
        let mut items = self.get_shard(key).write();

        self.purge_if_dead(&mut items, key, now, flush);
        items.get_mut(key).map(|item| {
            item.cas = self.next_cas();
            item.cas
        })
    }

    fn invalidate_before(&self, when: u32) {
        let now = Instant::now();
        let deadline = resolve_time(when, now).unwrap_or(now);

        self.flush_deadline
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .schedule(deadline, now);

        if deadline <= now {
            let cleaned = self.cleanup_expired();
            debug!(cleaned, "Flushed all items");
        } else {
            debug!(
                when,
                delay_secs = (deadline - now).as_secs(),
                "Scheduled delayed flush"
            );
        }
    }

    fn with_slot<T, F>(&self, key: &Bytes, f: F) -> T
    where
        F: FnOnce(&mut dyn Slot) -> T,
    {
        let now = Instant::now();
        let flush = self.flush_deadline();
        let mut items = self.get_shard(key).write();

        self.purge_if_dead(&mut items, key, now, flush);

        let mut slot = EngineSlot {
            engine: self,
            key,
            items: &mut *items,
        };
        f(&mut slot)
    }
}

/// A [`Slot`] over one key of a write-locked shard.
struct EngineSlot<'a> {
    engine: &'a StorageEngine,
    key: &'a Bytes,
    items: &'a mut ItemMap,
}

impl EngineSlot<'_> {
    fn reclaimable(&self) -> usize {
        self.item().map(Item::footprint).unwrap_or(0)
    }
}

impl Slot for EngineSlot<'_> {
    fn item(&self) -> Option<&Item> {
        self.items.get(self.key)
    }

    fn create(&mut self, value: Bytes, flags: u32, expiration: u32) -> StoreResult<Item> {
        self.engine.allocate(
            self.key.clone(),
            value,
            flags,
            expiration,
            ValueShape::Opaque,
            self.reclaimable(),
        )
    }

    fn create_counter(&mut self, initial: u64, expiration: u32) -> StoreResult<Item> {
        self.engine.allocate(
            self.key.clone(),
            encode_counter(initial),
            0,
            expiration,
            ValueShape::Counter,
            self.reclaimable(),
        )
    }

    fn insert(&mut self, item: Item) -> u64 {
        debug_assert_eq!(&item.key, self.key, "slot insert for a foreign key");
        self.engine.put(self.items, item)
    }

    fn remove(&mut self) -> bool {
        self.engine.take(self.items, self.key).is_some()
    }

    fn bump_cas(&mut self) -> Option<u64> {
        let engine = self.engine;
        self.items.get_mut(self.key).map(|item| {
            item.cas = engine.next_cas();
            item.cas
        })
    }

    fn store_counter(&mut self, value: u64) -> bool {
        match self.items.get_mut(self.key) {
            Some(item) if item.shape == ValueShape::Counter => {
                item.value = encode_counter(value);
                item.modified_at = Instant::now();
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::item::unix_now;
    use std::time::Duration;

    fn put(engine: &StorageEngine, key: &str, value: &str) -> u64 {
        let item = engine
            .create(Bytes::from(key.to_string()), Bytes::from(value.to_string()), 0, 0)
            .unwrap();
        engine.insert(item)
    }

    #[test]
    fn test_insert_and_lookup() {
        let engine = StorageEngine::new();

        let cas = put(&engine, "name", "Ariz");
        let item = engine.lookup(b"name").unwrap();

        assert_eq!(item.value(), &Bytes::from("Ariz"));
        assert_eq!(item.cas(), cas);
        assert_ne!(cas, 0);
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_lookup_nonexistent() {
        let engine = StorageEngine::new();
        assert!(engine.lookup(b"nonexistent").is_none());
    }

    #[test]
    fn test_create_does_not_insert() {
        let engine = StorageEngine::new();

        let _item = engine
            .create(Bytes::from("key"), Bytes::from("value"), 0, 0)
            .unwrap();

        assert!(engine.lookup(b"key").is_none());
        assert!(engine.is_empty());
    }

    #[test]
    fn test_insert_replaces() {
        let engine = StorageEngine::new();

        let first = put(&engine, "key", "one");
        let second = put(&engine, "key", "two");

        assert!(second > first);
        assert_eq!(engine.len(), 1);
        assert_eq!(engine.lookup(b"key").unwrap().value(), &Bytes::from("two"));
    }

    #[test]
    fn test_remove() {
        let engine = StorageEngine::new();
        put(&engine, "key", "value");

        assert!(engine.remove(b"key"));
        assert!(!engine.remove(b"key"));
        assert!(engine.lookup(b"key").is_none());
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.used_memory(), 0);
    }

    #[test]
    fn test_bump_cas() {
        let engine = StorageEngine::new();
        let cas = put(&engine, "key", "value");

        let bumped = engine.bump_cas(b"key").unwrap();
        assert!(bumped > cas);
        assert_eq!(engine.lookup(b"key").unwrap().cas(), bumped);
        assert_eq!(engine.lookup(b"key").unwrap().value(), &Bytes::from("value"));

        assert_eq!(engine.bump_cas(b"missing"), None);
    }

    #[test]
    fn test_expired_item_is_invisible() {
        let engine = StorageEngine::new();

        let item = engine
            .create(Bytes::from("old"), Bytes::from("value"), 0, unix_now() - 60)
            .unwrap();
        engine.insert(item);
        assert_eq!(engine.len(), 1);

        assert!(engine.lookup(b"old").is_none());
        // Lazy expiry removed it
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn test_remove_expired_reports_missing() {
        let engine = StorageEngine::new();

        let item = engine
            .create(Bytes::from("old"), Bytes::from("value"), 0, unix_now() - 60)
            .unwrap();
        engine.insert(item);

        assert!(!engine.remove(b"old"));
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn test_item_too_large() {
        let engine = StorageEngine::with_config(EngineConfig {
            max_memory: 1024 * 1024,
            max_item_size: 16,
        });

        let result = engine.create(Bytes::from("key"), Bytes::from(vec![0u8; 17]), 0, 0);
        assert!(matches!(result, Err(StoreError::OutOfMemory { .. })));
    }

    #[test]
    fn test_memory_limit() {
        let engine = StorageEngine::with_config(EngineConfig {
            max_memory: 256,
            max_item_size: 128,
        });

        put(&engine, "a", &"x".repeat(100));
        let result = engine.create(Bytes::from("b"), Bytes::from("x".repeat(100)), 0, 0);
        assert!(matches!(result, Err(StoreError::OutOfMemory { .. })));

        // Replacing an item may reuse its memory
        let replaced = engine.with_slot(&Bytes::from("a"), |slot| {
            let item = slot.create(Bytes::from("y".repeat(100)), 0, 0)?;
            Ok::<_, StoreError>(slot.insert(item))
        });
        assert!(replaced.is_ok());
        assert_eq!(engine.used_memory(), 1 + 100 + crate::storage::item::ITEM_OVERHEAD);
    }

    #[test]
    fn test_memory_limit_under_contention() {
        use std::sync::Arc;
        use std::thread;

        const THREADS: usize = 8;
        let item_size = 1 + 2 + 100 + crate::storage::item::ITEM_OVERHEAD;
        let engine = Arc::new(StorageEngine::with_config(EngineConfig {
            max_memory: 4096,
            max_item_size: 128,
        }));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let engine = Arc::clone(&engine);
                thread::spawn(move || {
                    let mut rejected = 0;
                    for i in 0..50 {
                        let key = Bytes::from(format!("{}{:02}", t, i));
                        match engine.create(key, Bytes::from("x".repeat(100)), 0, 0) {
                            Ok(item) => {
                                engine.insert(item);
                            }
                            Err(StoreError::OutOfMemory { .. }) => rejected += 1,
                        }
                    }
                    rejected
                })
            })
            .collect();

        let rejected: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert!(rejected > 0);
        assert!(engine.used_memory() <= 4096 + THREADS * item_size);
    }

    #[test]
    fn test_slot_counter() {
        let engine = StorageEngine::new();
        let key = Bytes::from("counter");

        let cas = engine.with_slot(&key, |slot| {
            let item = slot.create_counter(5, 0).unwrap();
            slot.insert(item)
        });

        let (value, bumped) = engine.with_slot(&key, |slot| {
            let current = slot.item().and_then(Item::counter).unwrap();
            assert!(slot.store_counter(current + 1));
            (current + 1, slot.bump_cas().unwrap())
        });

        assert_eq!(value, 6);
        assert!(bumped > cas);
        assert_eq!(engine.lookup(&key).unwrap().counter(), Some(6));
    }

    #[test]
    fn test_store_counter_rejects_opaque() {
        let engine = StorageEngine::new();
        put(&engine, "key", "12345678");

        let stored = engine.with_slot(&Bytes::from("key"), |slot| slot.store_counter(1));
        assert!(!stored);
        assert_eq!(engine.lookup(b"key").unwrap().value(), &Bytes::from("12345678"));
    }

    #[test]
    fn test_flush_now() {
        let engine = StorageEngine::new();
        put(&engine, "key1", "value1");
        put(&engine, "key2", "value2");

        engine.invalidate_before(0);

        assert!(engine.lookup(b"key1").is_none());
        assert!(engine.lookup(b"key2").is_none());
        assert_eq!(engine.len(), 0);

        // Items written after the flush are unaffected
        put(&engine, "key3", "value3");
        assert!(engine.lookup(b"key3").is_some());
    }

    #[test]
    fn test_flush_delayed() {
        let engine = StorageEngine::new();
        put(&engine, "key", "value");

        engine.invalidate_before(1);
        assert!(engine.lookup(b"key").is_some());

        std::thread::sleep(Duration::from_millis(1100));
        assert!(engine.lookup(b"key").is_none());
    }

    #[test]
    fn test_later_flush_keeps_passed_deadline() {
        let engine = StorageEngine::new();
        put(&engine, "key", "old");

        engine.invalidate_before(1);
        std::thread::sleep(Duration::from_millis(1100));

        // Nobody touched the item before the deadline moved out again
        engine.invalidate_before(100);
        assert!(engine.lookup(b"key").is_none());

        put(&engine, "key", "new");
        assert_eq!(engine.lookup(b"key").unwrap().value(), &Bytes::from("new"));
    }

    #[test]
    fn test_flush_window() {
        let now = Instant::now();
        let before = now - Duration::from_secs(5);
        let mut window = FlushWindow::default();
        assert!(!window.invalidates(before, now));

        window.schedule(now + Duration::from_secs(10), now);
        assert!(!window.invalidates(before, now));
        assert!(window.invalidates(before, now + Duration::from_secs(10)));

        // A pending deadline that never passed is simply replaced
        window.schedule(now + Duration::from_secs(60), now);
        assert!(!window.invalidates(before, now + Duration::from_secs(30)));

        let later = now + Duration::from_secs(61);
        window.schedule(later + Duration::from_secs(60), later);
        assert!(window.invalidates(before, later));
        assert!(!window.invalidates(later, later));
    }

    #[test]
    fn test_cleanup_expired() {
        let engine = StorageEngine::new();

        for key in ["key1", "key2"] {
            let item = engine
                .create(Bytes::from(key), Bytes::from("value"), 0, unix_now() - 1)
                .unwrap();
            engine.insert(item);
        }
        put(&engine, "key3", "value");

        let cleaned = engine.cleanup_expired();
        assert_eq!(cleaned, 2);
        assert_eq!(engine.len(), 1);
        assert!(engine.lookup(b"key3").is_some());
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    put(&engine, &key, "value");
                    engine.lookup(key.as_bytes());
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 1000);
    }

    #[test]
    fn test_slot_serializes_writers() {
        use std::sync::Arc;
        use std::thread;

        let engine = Arc::new(StorageEngine::new());
        let key = Bytes::from("shared");
        engine.with_slot(&key, |slot| {
            let item = slot.create_counter(0, 0).unwrap();
            slot.insert(item);
        });

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = Arc::clone(&engine);
                let key = key.clone();
                thread::spawn(move || {
                    for _ in 0..500 {
                        engine.with_slot(&key, |slot| {
                            let n = slot.item().and_then(Item::counter).unwrap();
                            slot.store_counter(n + 1);
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.lookup(&key).unwrap().counter(), Some(4000));
    }
}
