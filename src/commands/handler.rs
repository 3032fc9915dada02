//! Command Handler
//!
//! This module implements the memcached command semantics for FlashMC.
//! Each operation runs synchronously against an [`ItemStore`] and returns a
//! typed result; [`CommandHandler::execute`] wraps them for request/response
//! dispatch.
//!
//! ## Operations
//!
//! - `add` - Store only if the key is absent
//! - `set` - Store unconditionally (CAS-checked only if the key exists)
//! - `replace` - Store only if the key exists
//! - `append` / `prepend` - Concatenate onto an existing value
//! - `get` - Fetch value, flags and CAS
//! - `delete` - Remove a key, optionally CAS-checked
//! - `increment` / `decrement` - Counter arithmetic, creating on miss
//! - `flush` - Invalidate everything older than a point in time
//! - `stat`, `version`, `noop`, `quit`
//!
//! ## CAS Sequences
//!
//! Every operation that reads the current version before writing a new one
//! runs inside a single store slot:
//!
//! ```text
//! ┌──────────────────── with_slot(key) ────────────────────┐
//! │  item()  ──>  compare cas  ──>  create()  ──>  insert() │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! The new version is created before the old one is touched, so an
//! out-of-memory failure leaves the current item in place.

use crate::commands::types::{
    CommandError, CommandResult, Cookie, CounterResponse, GetResponse, Request, Response,
    StatRecord,
};
use crate::storage::{Item, ItemStore, StorageEngine};
use bytes::{Bytes, BytesMut};
use std::sync::Arc;
use tracing::{debug, trace};

/// Handler settings.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// String returned by `version`
    pub version: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            version: crate::VERSION.to_string(),
        }
    }
}

/// Where `concat` places the new bytes.
#[derive(Debug, Clone, Copy)]
enum Position {
    Append,
    Prepend,
}

/// Counter arithmetic direction.
#[derive(Debug, Clone, Copy)]
enum Delta {
    Increment,
    Decrement,
}

/// Executes cache commands against a shared item store.
///
/// The handler keeps no per-request state; clones share the same store and
/// may be used from any number of connections at once.
pub struct CommandHandler<S: ItemStore = StorageEngine> {
    store: Arc<S>,
    config: Arc<HandlerConfig>,
}

impl<S: ItemStore> Clone for CommandHandler<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: ItemStore> CommandHandler<S> {
    /// Creates a new command handler with the given store.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_config(store, HandlerConfig::default())
    }

    pub fn with_config(store: Arc<S>, config: HandlerConfig) -> Self {
        Self {
            store,
            config: Arc::new(config),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Executes a request and returns the response.
    pub fn execute(&self, cookie: Cookie, request: Request) -> Response {
        trace!(cookie = %cookie, command = request.name(), "Executing command");

        let result = match request {
            Request::Add {
                key,
                value,
                flags,
                expiration,
            } => self
                .add(cookie, &key, value, flags, expiration)
                .map(|cas| Response::Stored { cas }),
            Request::Set {
                key,
                value,
                flags,
                expiration,
                cas,
            } => self
                .set(cookie, &key, value, flags, expiration, cas)
                .map(|cas| Response::Stored { cas }),
            Request::Replace {
                key,
                value,
                flags,
                expiration,
                cas,
            } => self
                .replace(cookie, &key, value, flags, expiration, cas)
                .map(|cas| Response::Stored { cas }),
            Request::Append { key, value, cas } => self
                .append(cookie, &key, value, cas)
                .map(|cas| Response::Stored { cas }),
            Request::Prepend { key, value, cas } => self
                .prepend(cookie, &key, value, cas)
                .map(|cas| Response::Stored { cas }),
            Request::Get { key } => self.get(cookie, &key).map(Response::Value),
            Request::Delete { key, cas } => self.delete(cookie, &key, cas).map(|()| Response::Deleted),
            Request::Increment {
                key,
                delta,
                initial,
                expiration,
            } => self
                .increment(cookie, &key, delta, initial, expiration)
                .map(Response::Counter),
            Request::Decrement {
                key,
                delta,
                initial,
                expiration,
            } => self
                .decrement(cookie, &key, delta, initial, expiration)
                .map(Response::Counter),
            Request::Flush { when } => {
                self.flush(cookie, when);
                Ok(Response::Flushed)
            }
            Request::Stat { key } => Ok(Response::Stats(self.stat(cookie, key.as_ref()))),
            Request::Version => Ok(Response::Version(self.version(cookie).to_string())),
            Request::Noop => {
                self.noop(cookie);
                Ok(Response::Noop)
            }
            Request::Quit => {
                self.quit(cookie);
                Ok(Response::Quit)
            }
        };

        result.unwrap_or_else(Response::Error)
    }

    // ========================================================================
    // Storage commands
    // ========================================================================

    /// Stores `value` only if `key` is absent. Returns the new CAS.
    pub fn add(
        &self,
        cookie: Cookie,
        key: &Bytes,
        value: Bytes,
        flags: u32,
        expiration: u32,
    ) -> CommandResult<u64> {
        let result = self.store.with_slot(key, |slot| {
            if slot.item().is_some() {
                return Err(CommandError::KeyExists);
            }
            let item = slot.create(value, flags, expiration)?;
            Ok(slot.insert(item))
        });

        debug!(cookie = %cookie, key = ?key, result = ?result, "add");
        result
    }

    /// Stores `value` unconditionally. Returns the new CAS.
    ///
    /// A nonzero `cas` is only checked when the key exists; on a missing key
    /// the set goes ahead as a plain create.
    pub fn set(
        &self,
        cookie: Cookie,
        key: &Bytes,
        value: Bytes,
        flags: u32,
        expiration: u32,
        cas: u64,
    ) -> CommandResult<u64> {
        let result = self.store.with_slot(key, |slot| {
            if cas != 0 && slot.item().is_some_and(|current| current.cas() != cas) {
                return Err(CommandError::KeyExists);
            }
            let item = slot.create(value, flags, expiration)?;
            Ok(slot.insert(item))
        });

        debug!(cookie = %cookie, key = ?key, cas, result = ?result, "set");
        result
    }

    /// Stores `value` only if `key` exists (and matches a nonzero `cas`).
    pub fn replace(
        &self,
        cookie: Cookie,
        key: &Bytes,
        value: Bytes,
        flags: u32,
        expiration: u32,
        cas: u64,
    ) -> CommandResult<u64> {
        let result = self.store.with_slot(key, |slot| {
            check_cas(slot.item(), cas)?;
            let item = slot.create(value, flags, expiration)?;
            Ok(slot.insert(item))
        });

        debug!(cookie = %cookie, key = ?key, cas, result = ?result, "replace");
        result
    }

    /// Appends `value` to the existing value, keeping flags and expiration.
    pub fn append(&self, cookie: Cookie, key: &Bytes, value: Bytes, cas: u64) -> CommandResult<u64> {
        let result = self.concat(key, &value, cas, Position::Append);
        debug!(cookie = %cookie, key = ?key, cas, result = ?result, "append");
        result
    }

    /// Prepends `value` to the existing value, keeping flags and expiration.
    pub fn prepend(&self, cookie: Cookie, key: &Bytes, value: Bytes, cas: u64) -> CommandResult<u64> {
        let result = self.concat(key, &value, cas, Position::Prepend);
        debug!(cookie = %cookie, key = ?key, cas, result = ?result, "prepend");
        result
    }

    fn concat(&self, key: &Bytes, value: &[u8], cas: u64, position: Position) -> CommandResult<u64> {
        self.store.with_slot(key, |slot| {
            let current = check_cas(slot.item(), cas)?;
            let (old, flags, expiration) =
                (current.value().clone(), current.flags(), current.expiration());

            let mut joined = BytesMut::with_capacity(old.len() + value.len());
            match position {
                Position::Append => {
                    joined.extend_from_slice(&old);
                    joined.extend_from_slice(value);
                }
                Position::Prepend => {
                    joined.extend_from_slice(value);
                    joined.extend_from_slice(&old);
                }
            }

            let item = slot.create(joined.freeze(), flags, expiration)?;
            Ok(slot.insert(item))
        })
    }

    // ========================================================================
    // Retrieval and removal
    // ========================================================================

    /// Fetches the item stored under `key`.
    pub fn get(&self, cookie: Cookie, key: &Bytes) -> CommandResult<GetResponse> {
        let item = self.store.lookup(key);
        trace!(cookie = %cookie, key = ?key, hit = item.is_some(), "get");

        item.map(|item| GetResponse {
            key: item.key().clone(),
            value: item.value().clone(),
            flags: item.flags(),
            cas: item.cas(),
        })
        .ok_or(CommandError::KeyNotFound)
    }

    /// Removes `key`.
    ///
    /// A nonzero `cas` is checked before removal, and only if the key exists.
    pub fn delete(&self, cookie: Cookie, key: &Bytes, cas: u64) -> CommandResult<()> {
        let result = self.store.with_slot(key, |slot| {
            if cas != 0 && slot.item().is_some_and(|current| current.cas() != cas) {
                return Err(CommandError::KeyExists);
            }
            if slot.remove() {
                Ok(())
            } else {
                Err(CommandError::KeyNotFound)
            }
        });

        debug!(cookie = %cookie, key = ?key, cas, result = ?result, "delete");
        result
    }

    // ========================================================================
    // Counters
    // ========================================================================

    /// Adds `delta` to a counter, wrapping on overflow.
    ///
    /// A missing key is created holding `initial`, which is returned as is.
    pub fn increment(
        &self,
        cookie: Cookie,
        key: &Bytes,
        delta: u64,
        initial: u64,
        expiration: u32,
    ) -> CommandResult<CounterResponse> {
        let result = self.apply_delta(key, delta, initial, expiration, Delta::Increment);
        debug!(cookie = %cookie, key = ?key, delta, result = ?result, "increment");
        result
    }

    /// Subtracts `delta` from a counter, stopping at zero.
    ///
    /// A missing key is created holding `initial`, which is returned as is.
    pub fn decrement(
        &self,
        cookie: Cookie,
        key: &Bytes,
        delta: u64,
        initial: u64,
        expiration: u32,
    ) -> CommandResult<CounterResponse> {
        let result = self.apply_delta(key, delta, initial, expiration, Delta::Decrement);
        debug!(cookie = %cookie, key = ?key, delta, result = ?result, "decrement");
        result
    }

    fn apply_delta(
        &self,
        key: &Bytes,
        delta: u64,
        initial: u64,
        expiration: u32,
        direction: Delta,
    ) -> CommandResult<CounterResponse> {
        self.store.with_slot(key, |slot| {
            let current = match slot.item().map(Item::counter) {
                None => {
                    let item = slot.create_counter(initial, expiration)?;
                    let cas = slot.insert(item);
                    return Ok(CounterResponse {
                        value: initial,
                        cas,
                    });
                }
                Some(None) => return Err(CommandError::NonNumeric),
                Some(Some(current)) => current,
            };

            let value = match direction {
                Delta::Increment => current.wrapping_add(delta),
                Delta::Decrement => current.saturating_sub(delta),
            };

            if !slot.store_counter(value) {
                return Err(CommandError::NonNumeric);
            }
            let cas = slot.bump_cas().ok_or(CommandError::KeyNotFound)?;

            Ok(CounterResponse { value, cas })
        })
    }

    // ========================================================================
    // Server commands
    // ========================================================================

    /// Invalidates every item last modified before `when`.
    pub fn flush(&self, cookie: Cookie, when: u32) {
        self.store.invalidate_before(when);
        debug!(cookie = %cookie, when, "flush");
    }

    /// Returns the stat records for `key`, ending with the terminator record.
    pub fn stat(&self, cookie: Cookie, key: Option<&Bytes>) -> Vec<StatRecord> {
        trace!(cookie = %cookie, group = ?key, "stat");
        vec![StatRecord::terminator()]
    }

    pub fn version(&self, cookie: Cookie) -> &str {
        trace!(cookie = %cookie, "version");
        &self.config.version
    }

    pub fn noop(&self, cookie: Cookie) {
        trace!(cookie = %cookie, "noop");
    }

    pub fn quit(&self, cookie: Cookie) {
        debug!(cookie = %cookie, "quit");
    }
}

/// Requires an existing item, and a matching CAS when `cas` is nonzero.
fn check_cas(current: Option<&Item>, cas: u64) -> CommandResult<&Item> {
    match current {
        None => Err(CommandError::KeyNotFound),
        Some(item) if cas != 0 && item.cas() != cas => Err(CommandError::KeyExists),
        Some(item) => Ok(item),
    }
}
