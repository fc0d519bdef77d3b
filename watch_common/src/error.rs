//! Error types shared by the watchlist core, the feed server and the client.
//!
//! `WatchError` unifies the domain failures of the live watchlist (cap reached,
//! unknown entity, connection problems, stale ticks) with the plumbing failures
//! of I/O, serialization, channels and locks, so every crate can propagate a
//! single error type with `?`.
//!
//! `RestFailure` is the typed failure of a REST-style lookup (profile, candles,
//! news). It travels over the wire inside feed replies, hence the serde derives.
use std::io;
use std::sync::PoisonError;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unified error type shared across the workspace.
#[derive(Error, Debug)]
pub enum WatchError {
    /// A new watch was rejected because the subscription cap is reached.
    #[error("Subscription cap exceeded: at most {limit} symbols can be watched live")]
    CapExceeded {
        /// The cap that was hit.
        limit: usize,
    },

    /// An operation referenced an entity id the collection does not hold.
    #[error("Watched entity not found: {0}")]
    NotFound(u64),

    /// Opening the push source or talking to it failed.
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    /// A tick arrived for a symbol that is not currently subscribed.
    #[error("Stale tick for {0}")]
    StaleTick(String),

    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Error while parsing the symbols file.
    #[error("Parse symbols file error: {0}")]
    ParseSymbolsFile(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// Channel receive failed (e.g., sender closed); contains a short context string.
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),

    /// A poisoned mutex was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),

    /// A REST-style lookup failed.
    #[error("REST request failed: {0}")]
    Rest(#[from] RestFailure),
}

impl<T> From<PoisonError<T>> for WatchError {
    fn from(err: PoisonError<T>) -> Self {
        WatchError::MutexLock(err.to_string())
    }
}

/// Typed failure of a REST-style lookup.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum RestFailure {
    /// Upstream API request limit reached.
    #[error("request limit reached")]
    Limit,
    /// Upstream does not know the symbol.
    #[error("unknown symbol {0}")]
    NotFound(String),
    /// The source does not provide this kind of data.
    #[error("not supported by this source")]
    Unsupported,
    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(String),
    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
}
