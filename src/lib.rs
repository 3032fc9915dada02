//! # FlashMC - Memcached Command Semantics in Rust
//!
//! FlashMC is the command layer of a memcached-compatible cache: the part
//! that decides what `add`, `set`, `cas`, `append`, `incr` and friends
//! actually do to the stored items. Wire framing and networking live in
//! front of it; the item store lives behind it.
//!
//! ## Features
//!
//! - **Optimistic Concurrency**: Every item carries a CAS token; guarded
//!   writes fail with `KeyExists` instead of losing updates
//! - **Atomic Per Key**: Read-compare-write sequences run under one shard lock
//! - **Typed Counters**: Increment wraps, decrement saturates, and neither
//!   touches values that were not created as counters
//! - **Memcached Expiry**: Relative and absolute expiration times plus
//!   immediate or delayed flush
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              FlashMC                                    │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────────────────┐ │
//! │  │  Protocol   │───>│  Request    │───>│       CommandHandler         │ │
//! │  │ (external)  │    │             │    │  add/set/replace/append/...  │ │
//! │  └─────────────┘    └─────────────┘    └──────────────┬───────────────┘ │
//! │                                                       │ ItemStore       │
//! │                                                       ▼                 │
//! │                     ┌──────────────────────────────────────────────┐   │
//! │                     │              StorageEngine                   │   │
//! │                     │  ┌────────┐ ┌────────┐ ┌────────┐ ┌────────┐ │   │
//! │                     │  │Shard 0 │ │Shard 1 │ │Shard 2 │ │...N    │ │   │
//! │                     │  │RwLock  │ │RwLock  │ │RwLock  │ │shards  │ │   │
//! │                     │  └────────┘ └────────┘ └────────┘ └────────┘ │   │
//! │                     └──────────────────────────────────────────────┘   │
//! │                                               ▲                         │
//! │                     ┌─────────────────────────┴───────────────────────┐ │
//! │                     │           ExpirySweeper                         │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use flashmc::{CommandError, CommandHandler, Cookie, StorageEngine};
//! use bytes::Bytes;
//! use std::sync::Arc;
//!
//! let storage = Arc::new(StorageEngine::new());
//! let handler = CommandHandler::new(storage);
//! let conn = Cookie(1);
//! let key = Bytes::from("user:1");
//!
//! let cas = handler.add(conn, &key, Bytes::from("alice"), 0, 0).unwrap();
//! assert_eq!(handler.get(conn, &key).unwrap().value, Bytes::from("alice"));
//!
//! // A write guarded by a stale CAS is rejected
//! let stale = handler.set(conn, &key, Bytes::from("bob"), 0, 0, cas + 1);
//! assert_eq!(stale, Err(CommandError::KeyExists));
//! ```
//!
//! ## Module Overview
//!
//! - [`commands`]: Command handler, requests, responses and status codes
//! - [`storage`]: Item store contract, sharded engine and expiry sweeper
//! - [`telemetry`]: Tracing subscriber setup

pub mod commands;
pub mod storage;
pub mod telemetry;

pub use commands::{
    CommandError, CommandHandler, CommandResult, Cookie, HandlerConfig, Request, Response, Status,
};
pub use storage::{
    start_expiry_sweeper, EngineConfig, ExpiryConfig, ExpirySweeper, Item, ItemStore,
    StorageEngine,
};

/// Version of FlashMC, reported by the `version` command by default
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
