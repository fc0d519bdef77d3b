//! Collaborators consumed by the watchlist.
//!
//! - [`PersistentStore`]: key-value persistence of watched entities by id.
//! - [`PushSource`]: live price feed: open a tick stream, (un)subscribe symbols.
//! - [`RestSource`]: one-shot lookups of profiles, candles and news.
//!
//! All three are object safe and shared as `Arc<dyn _>` inside a
//! [`crate::WatchContext`].
use crossbeam_channel::{Receiver, Sender, unbounded};
use watch_common::market::{Candle, CompanyProfile, NewsItem, TimeRange};
use watch_common::{RestFailure, Result, Tick};

use crate::entity::{EntityId, WatchedEntity};

/// Durable storage of watched entities.
pub trait PersistentStore: Send + Sync {
    /// Loads one entity.
    fn get(&self, id: EntityId) -> Result<Option<WatchedEntity>>;
    /// Inserts or replaces an entity.
    fn put(&self, entity: &WatchedEntity) -> Result<()>;
    /// Deletes an entity; deleting an absent id succeeds.
    fn delete(&self, id: EntityId) -> Result<()>;
    /// Loads every entity, in no particular order.
    fn get_all(&self) -> Result<Vec<WatchedEntity>>;
}

/// Ticks produced by one opened push-source connection.
///
/// The stream ends (the receiver disconnects) when the source drops its
/// sender, typically on [`PushSource::close`]. It cannot be restarted; a new
/// stream comes only from another [`PushSource::open`].
pub struct TickStream {
    rx: Receiver<Tick>,
}

impl TickStream {
    /// Creates a connected sender/stream pair for push-source implementations.
    pub fn channel() -> (Sender<Tick>, TickStream) {
        let (tx, rx) = unbounded();
        (tx, TickStream { rx })
    }

    /// Wraps an existing receiver.
    pub fn new(rx: Receiver<Tick>) -> Self {
        Self { rx }
    }

    /// Underlying receiver, for use in `select!`.
    pub fn receiver(&self) -> &Receiver<Tick> {
        &self.rx
    }
}

/// Live price feed.
pub trait PushSource: Send + Sync {
    /// Opens the connection and returns its tick stream.
    fn open(&self) -> Result<TickStream>;
    /// Asks the feed to stream `symbol`.
    fn subscribe(&self, symbol: &str) -> Result<()>;
    /// Asks the feed to stop streaming `symbol`.
    fn unsubscribe(&self, symbol: &str) -> Result<()>;
    /// Tears the connection down; the open stream ends.
    fn close(&self);
}

/// One-shot market data lookups.
pub trait RestSource: Send + Sync {
    /// Company profile with the day's open and current price.
    fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, RestFailure>;
    /// Candles inside `range`.
    fn fetch_candles(&self, symbol: &str, range: TimeRange) -> Result<Vec<Candle>, RestFailure>;
    /// News inside `range`.
    fn fetch_news(&self, symbol: &str, range: TimeRange) -> Result<Vec<NewsItem>, RestFailure>;
}
