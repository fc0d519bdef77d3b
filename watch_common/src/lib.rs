//!
//! Common types and utilities shared by the watchlist core, the feed and the client.
//!
//! This crate aggregates:
//! - `error`: unified error type `WatchError` and the REST failure taxonomy.
//! - `result`: handy `Result<T, WatchError>` alias.
//! - `tick`: price ticks and the feed's datagram format.
//! - `market`: profiles, candles and news returned by lookups.
//! - `command`: TCP command and reply payloads exchanged with the feed.
//! - `symbols`: parsing of the client's symbols file.
//! - `net`: networking constants and small helpers.
#![warn(missing_docs)]
pub mod command;
pub mod error;
pub mod market;
pub mod net;
pub mod result;
pub mod symbols;
pub mod tick;

pub use command::{Command, Reply};
pub use error::{RestFailure, WatchError};
pub use result::Result;
pub use tick::Tick;
