//! Cache Items
//!
//! An [`Item`] is the unit the store keeps per key: the value bytes plus the
//! client metadata (flags, expiration) and the CAS version token.
//!
//! ## Value Shapes
//!
//! Items written by `set`/`add`/`append` and friends are [`ValueShape::Opaque`]:
//! the store never looks inside them. Items born on the increment/decrement
//! create path are [`ValueShape::Counter`] and always hold exactly 8 bytes
//! (a native-endian `u64`). Counter operations only accept counter-shaped items,
//! so arbitrary bytes are never reinterpreted as a number.
//!
//! ## Expiration Times
//!
//! Expiration follows the memcached convention:
//!
//! ```text
//!   0                    never expires
//!   1 ..= 2_592_000      relative: seconds from now (up to 30 days)
//!   > 2_592_000          absolute: Unix timestamp in seconds
//! ```

use bytes::Bytes;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Largest key the store accepts, in bytes.
pub const MAX_KEY_LENGTH: usize = 250;

/// Expiration values above this are absolute Unix timestamps.
pub const RELATIVE_EXPIRATION_LIMIT: u32 = 60 * 60 * 24 * 30;

/// Size of a counter value.
pub const COUNTER_SIZE: usize = std::mem::size_of::<u64>();

/// How an item's value bytes may be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// Arbitrary client bytes
    Opaque,
    /// An 8-byte native-endian unsigned counter
    Counter,
}

/// A stored cache entry.
///
/// Items are immutable once built; a new version of a key is a new `Item`
/// that replaces the old one. Counter values are the only exception and are
/// rewritten in place by the store.
#[derive(Debug, Clone)]
pub struct Item {
    pub(crate) key: Bytes,
    pub(crate) value: Bytes,
    pub(crate) flags: u32,
    pub(crate) expiration: u32,
    pub(crate) cas: u64,
    pub(crate) shape: ValueShape,
    /// When this version was created or last rewritten
    pub(crate) modified_at: Instant,
    /// Deadline resolved from `expiration` (None = never expires)
    pub(crate) expires_at: Option<Instant>,
}

impl Item {
    /// Builds an item stamped as modified now, resolving `expiration`.
    ///
    /// Only the store builds items, so every CAS comes from its counter:
    ///
    /// ```compile_fail
    /// use bytes::Bytes;
    /// use flashmc::storage::{Item, ValueShape};
    ///
    /// let forged = Item::new(Bytes::from("k"), Bytes::new(), 0, 0, 0, ValueShape::Opaque);
    /// ```
    pub(crate) fn new(
        key: Bytes,
        value: Bytes,
        flags: u32,
        expiration: u32,
        cas: u64,
        shape: ValueShape,
    ) -> Self {
        let now = Instant::now();
        Self {
            key,
            value,
            flags,
            expiration,
            cas,
            shape,
            modified_at: now,
            expires_at: resolve_time(expiration, now),
        }
    }

    pub fn key(&self) -> &Bytes {
        &self.key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// The expiration exactly as the client supplied it.
    pub fn expiration(&self) -> u32 {
        self.expiration
    }

    pub fn cas(&self) -> u64 {
        self.cas
    }

    pub fn shape(&self) -> ValueShape {
        self.shape
    }

    /// Returns the counter value, or `None` if this item is not counter-shaped.
    pub fn counter(&self) -> Option<u64> {
        if self.shape != ValueShape::Counter {
            return None;
        }
        let bytes: [u8; COUNTER_SIZE] = self.value.as_ref().try_into().ok()?;
        Some(u64::from_ne_bytes(bytes))
    }

    /// Checks if this item has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    #[inline]
    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Approximate memory footprint: key + value + bookkeeping overhead.
    pub(crate) fn footprint(&self) -> usize {
        footprint(self.key.len(), self.value.len())
    }
}

/// Per-item bookkeeping estimate used for memory accounting.
pub(crate) const ITEM_OVERHEAD: usize = 64;

#[inline]
pub(crate) fn footprint(key_len: usize, value_len: usize) -> usize {
    key_len + value_len + ITEM_OVERHEAD
}

/// Encodes a counter value into its stored representation.
pub(crate) fn encode_counter(value: u64) -> Bytes {
    Bytes::copy_from_slice(&value.to_ne_bytes())
}

/// Resolves a memcached-style time value against `now`.
///
/// Returns `None` for `0`. Absolute timestamps that already passed resolve
/// to `now`, so anything compared against them is immediately stale.
pub(crate) fn resolve_time(time: u32, now: Instant) -> Option<Instant> {
    if time == 0 {
        return None;
    }

    if time <= RELATIVE_EXPIRATION_LIMIT {
        return Some(now + Duration::from_secs(u64::from(time)));
    }

    let unix_now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();

    let remaining = u64::from(time).saturating_sub(unix_now);
    Some(now + Duration::from_secs(remaining))
}

/// Current Unix time in seconds, for callers building absolute expirations.
pub fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(unix_seconds)
        .unwrap_or(0)
}

/// Whole seconds of `since_epoch`, saturating at the end of the `u32` range.
fn unix_seconds(since_epoch: Duration) -> u32 {
    u32::try_from(since_epoch.as_secs()).unwrap_or(u32::MAX)
}
