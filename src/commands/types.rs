//! Request, Response and Status Types
//!
//! The handler's inputs and outputs as plain data. A protocol frontend parses
//! a frame into a [`Request`], hands it to
//! [`CommandHandler::execute`](crate::commands::CommandHandler::execute), and
//! encodes the [`Response`] it gets back. [`Response::status`] gives the
//! binary-protocol status for any outcome.

use crate::storage::StoreError;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

/// Identity of the calling connection.
///
/// Opaque to the handler; it is only threaded through into log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cookie(pub u64);

impl fmt::Display for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Reasons a command did not take effect.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// The command needs an existing key and there is none
    #[error("key not found")]
    KeyNotFound,

    /// `add` hit an existing key, or a CAS check failed
    #[error("key exists")]
    KeyExists,

    /// The new item could not be allocated; the store is unchanged
    #[error("out of memory")]
    OutOfMemory,

    /// Increment/decrement on an item that is not a counter
    #[error("value is not a counter")]
    NonNumeric,
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OutOfMemory { .. } => CommandError::OutOfMemory,
        }
    }
}

/// Result type for handler operations.
pub type CommandResult<T> = Result<T, CommandError>;

/// Protocol-level outcome of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    KeyNotFound,
    KeyExists,
    NonNumeric,
    OutOfMemory,
}

impl Status {
    /// The binary protocol's status code.
    pub fn code(self) -> u16 {
        match self {
            Status::Success => 0x0000,
            Status::KeyNotFound => 0x0001,
            Status::KeyExists => 0x0002,
            Status::NonNumeric => 0x0006,
            Status::OutOfMemory => 0x0082,
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

impl From<&CommandError> for Status {
    fn from(err: &CommandError) -> Self {
        match err {
            CommandError::KeyNotFound => Status::KeyNotFound,
            CommandError::KeyExists => Status::KeyExists,
            CommandError::OutOfMemory => Status::OutOfMemory,
            CommandError::NonNumeric => Status::NonNumeric,
        }
    }
}

impl<T> From<&CommandResult<T>> for Status {
    fn from(result: &CommandResult<T>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(err) => err.into(),
        }
    }
}

/// A fetched item as returned by `get`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetResponse {
    pub key: Bytes,
    pub value: Bytes,
    pub flags: u32,
    pub cas: u64,
}

/// Outcome of an increment or decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterResponse {
    /// The counter value after the operation
    pub value: u64,
    pub cas: u64,
}

/// One `stat` record. An empty key and value mark the end of the stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatRecord {
    pub key: Bytes,
    pub value: Bytes,
}

impl StatRecord {
    /// The end-of-stats marker.
    pub fn terminator() -> Self {
        Self::default()
    }

    pub fn is_terminator(&self) -> bool {
        self.key.is_empty() && self.value.is_empty()
    }
}

/// A single client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Add {
        key: Bytes,
        value: Bytes,
        flags: u32,
        expiration: u32,
    },
    Set {
        key: Bytes,
        value: Bytes,
        flags: u32,
        expiration: u32,
        cas: u64,
    },
    Replace {
        key: Bytes,
        value: Bytes,
        flags: u32,
        expiration: u32,
        cas: u64,
    },
    Append {
        key: Bytes,
        value: Bytes,
        cas: u64,
    },
    Prepend {
        key: Bytes,
        value: Bytes,
        cas: u64,
    },
    Get {
        key: Bytes,
    },
    Delete {
        key: Bytes,
        cas: u64,
    },
    Increment {
        key: Bytes,
        delta: u64,
        initial: u64,
        expiration: u32,
    },
    Decrement {
        key: Bytes,
        delta: u64,
        initial: u64,
        expiration: u32,
    },
    Flush {
        when: u32,
    },
    Stat {
        key: Option<Bytes>,
    },
    Version,
    Noop,
    Quit,
}

impl Request {
    /// Command name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Add { .. } => "add",
            Request::Set { .. } => "set",
            Request::Replace { .. } => "replace",
            Request::Append { .. } => "append",
            Request::Prepend { .. } => "prepend",
            Request::Get { .. } => "get",
            Request::Delete { .. } => "delete",
            Request::Increment { .. } => "increment",
            Request::Decrement { .. } => "decrement",
            Request::Flush { .. } => "flush",
            Request::Stat { .. } => "stat",
            Request::Version => "version",
            Request::Noop => "noop",
            Request::Quit => "quit",
        }
    }
}

/// The handler's answer to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// A storage command succeeded; carries the new CAS
    Stored { cas: u64 },
    Value(GetResponse),
    Deleted,
    Counter(CounterResponse),
    Flushed,
    Stats(Vec<StatRecord>),
    Version(String),
    Noop,
    /// Acknowledged; the caller should close the connection
    Quit,
    Error(CommandError),
}

impl Response {
    pub fn status(&self) -> Status {
        match self {
            Response::Error(err) => err.into(),
            _ => Status::Success,
        }
    }
}
