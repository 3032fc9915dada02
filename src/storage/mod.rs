//! Storage Module
//!
//! This module provides the item store the command layer runs against:
//! the [`ItemStore`] contract, the sharded in-memory [`StorageEngine`] that
//! implements it, and a background sweeper for expired items.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │           ItemStore (lookup/create/insert/remove/...)       │
//! │                            ▲                                │
//! │                            │ impl                           │
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │...64    │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │     ExpirySweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use flashmc::storage::{ItemStore, StorageEngine};
//! use bytes::Bytes;
//!
//! let engine = StorageEngine::new();
//! let key = Bytes::from("visits");
//!
//! // Read-modify-write under the key's lock
//! let cas = engine.with_slot(&key, |slot| {
//!     let item = slot.create_counter(1, 0).unwrap();
//!     slot.insert(item)
//! });
//!
//! assert_eq!(engine.lookup(&key).unwrap().counter(), Some(1));
//! assert_eq!(engine.lookup(&key).unwrap().cas(), cas);
//! ```

pub mod engine;
pub mod expiry;
pub mod item;
pub mod store;

pub use engine::{EngineConfig, StorageEngine};
pub use expiry::{start_expiry_sweeper, ExpiryConfig, ExpirySweeper};
pub use item::{Item, ValueShape, MAX_KEY_LENGTH};
pub use store::{ItemStore, Slot, StoreError, StoreResult};
