//! Live-updating cached watchlist.
//!
//! Keeps the user's watched companies in memory, mirrors them to a persistent
//! store, and applies live price ticks from a push source while tolerating
//! connection loss and reconnects.
//!
//! This crate aggregates:
//! - `registry`: subscription registry with the 50-symbol cap.
//! - `reconciler`: applies ticks, last-write-wins, computes profit.
//! - `store`: ordered, id-indexed cached collection and the observed entity.
//! - `connection`: push-source lifecycle, tick pump and request dispatcher.
//! - `hub`: non-blocking change stream for observers.
//! - `persist`: best-effort persistence writer thread.
//! - `source`: collaborator traits (persistent store, push source, REST source).
//! - `storage`: in-memory and JSON-file persistent stores.
//! - `watchlist`: the facade tying it together.
pub mod config;
pub mod connection;
pub mod entity;
pub mod hub;
pub mod persist;
pub mod reconciler;
pub mod registry;
pub mod source;
pub mod storage;
pub mod store;
pub mod watchlist;

pub use config::{MAX_SUBSCRIPTIONS, WatchConfig};
pub use connection::ConnectionState;
pub use entity::{EntityId, WatchedEntity};
pub use hub::{ChangeEvent, ChangeStream};
pub use reconciler::{TickOutcome, profit_label};
pub use registry::SymbolState;
pub use source::{PersistentStore, PushSource, RestSource, TickStream};
pub use storage::{JsonFileStore, MemoryStore};
pub use watchlist::{WatchContext, Watchlist};
