//! Command Handler Module
//!
//! This module implements the command processing layer for FlashMC.
//! It receives typed requests, executes them against an item store,
//! and returns typed responses carrying a protocol status.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ Protocol parser │  (external)
//! └────────┬────────┘
//!          │ Request
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - CAS checks   │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   ItemStore     │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - Storage: `add`, `set`, `replace`, `append`, `prepend`
//! - Retrieval: `get`
//! - Removal: `delete`, `flush`
//! - Counters: `increment`, `decrement`
//! - Server: `stat`, `version`, `noop`, `quit`

pub mod handler;
pub mod types;

pub use handler::{CommandHandler, HandlerConfig};
pub use types::{
    CommandError, CommandResult, Cookie, CounterResponse, GetResponse, Request, Response,
    StatRecord, Status,
};
