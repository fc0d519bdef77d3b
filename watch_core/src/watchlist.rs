//! The live watchlist facade.
//!
//! [`Watchlist`] is built from an explicit [`WatchContext`] and is the only
//! entry point the UI layer needs: add/remove/list watched entities, follow the
//! change stream, and open/close the live connection.
//!
//! One mutex guards the collection, the registry and the connection epoch;
//! UI operations and tick delivery all mutate under it, one writer at a time.
//! Persistence happens behind it on the writer thread and never delays a read.
use std::sync::{Arc, Mutex};

use crossbeam_channel::Sender;
use log::{debug, info};
use watch_common::market::{Candle, NewsItem, TimeRange};
use watch_common::{Result, Tick, WatchError};

use crate::config::WatchConfig;
use crate::connection::{ConnectionManager, ConnectionState, Request};
use crate::entity::{EntityId, WatchedEntity};
use crate::hub::{ChangeEvent, ChangeHub, ChangeStream};
use crate::persist::PersistenceWriter;
use crate::reconciler::{TickOutcome, reconcile};
use crate::registry::{Admission, SubscriptionRegistry, SymbolState};
use crate::source::{PersistentStore, PushSource, RestSource};
use crate::store::CachedCollection;

/// Collaborators and settings a [`Watchlist`] is built from.
pub struct WatchContext {
    pub store: Arc<dyn PersistentStore>,
    pub push: Arc<dyn PushSource>,
    pub rest: Arc<dyn RestSource>,
    pub config: WatchConfig,
}

pub(crate) struct State {
    pub(crate) registry: SubscriptionRegistry,
    pub(crate) collection: CachedCollection,
    /// Bumped on every open and close.
    pub(crate) epoch: u64,
    /// Present while a connection is open.
    pub(crate) requests: Option<Sender<Request>>,
}

impl State {
    fn request(&self, request: Request) {
        if let Some(tx) = &self.requests {
            if tx.send(request).is_err() {
                debug!("Request dropped, dispatcher is gone");
            }
        }
    }
}

pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
    pub(crate) hub: ChangeHub,
}

impl Shared {
    /// Applies a tick read under connection `epoch`.
    pub(crate) fn deliver(&self, epoch: u64, tick: &Tick) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if state.epoch != epoch {
            debug!("Discarding tick for {} from a closed connection", tick.symbol);
            return;
        }
        let state = &mut *state;
        let outcome = reconcile(&mut state.registry, &mut state.collection, tick);
        if let Some(event) = outcome.into_event() {
            self.hub.publish(event);
        }
    }
}

pub struct Watchlist {
    shared: Arc<Shared>,
    connection: ConnectionManager,
    store: Arc<dyn PersistentStore>,
    rest: Arc<dyn RestSource>,
    writer: PersistenceWriter,
}

impl Watchlist {
    pub fn new(context: WatchContext) -> Self {
        let writer = PersistenceWriter::start(Arc::clone(&context.store));
        let state = State {
            registry: SubscriptionRegistry::new(context.config.max_subscriptions),
            collection: CachedCollection::new(writer.persister()),
            epoch: 0,
            requests: None,
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                hub: ChangeHub::new(context.config.observer_buffer),
            }),
            connection: ConnectionManager::new(context.push),
            store: context.store,
            rest: context.rest,
            writer,
        }
    }

    /// Reloads the collection from the persistent store. When the connection
    /// is open the restored symbols are resubscribed, otherwise they are held
    /// as pending and count toward the cap. Returns the entity count.
    pub fn restore(&self) -> Result<usize> {
        let entities = self.store.get_all()?;
        let mut state = self.shared.state.lock()?;
        state.collection.restore(entities);
        let entities = state.collection.list_all();
        if state.registry.is_online() {
            for symbol in state.registry.resubscribe_all(&entities) {
                state.request(Request::Subscribe(symbol));
            }
        } else {
            state.registry.hold_pending(&entities);
        }
        info!("Restored {} watched entities", state.collection.len());
        Ok(state.collection.len())
    }

    /// Starts watching `symbol`. Watching an already watched symbol returns
    /// the existing entity unchanged.
    ///
    /// Fails with [`WatchError::CapExceeded`] when the subscription cap is
    /// reached.
    pub fn add(&self, symbol: &str, open_price: f64) -> Result<WatchedEntity> {
        let symbol = symbol.trim();
        let mut state = self.shared.state.lock()?;
        if let Some(existing) = state.collection.find_by_symbol(symbol) {
            return Ok(existing.clone());
        }
        if let Err(e) = state.registry.check_capacity() {
            info!("Rejected {}: {}", symbol, e);
            return Err(e);
        }

        let entity = state.collection.insert_front(symbol, open_price);
        if state.registry.add(symbol, entity.id, false)? == Admission::Subscribe {
            state.request(Request::Subscribe(entity.symbol.clone()));
        }
        self.shared.hub.publish(ChangeEvent::Added(entity.clone()));
        Ok(entity)
    }

    /// Looks the open price up through the REST source, then adds.
    pub fn add_from_profile(&self, symbol: &str) -> Result<WatchedEntity> {
        let profile = self.rest.fetch_profile(symbol)?;
        let entity = self.add(&profile.symbol, profile.open_price)?;
        self.apply_quote(entity.id, profile.open_price, profile.current_price)
    }

    /// Stops watching an entity. Unknown ids are a logged no-op.
    pub fn remove(&self, id: EntityId) -> Option<WatchedEntity> {
        let mut state = self.shared.state.lock().ok()?;
        let Some(entity) = state.collection.remove(id) else {
            debug!("Ignoring remove of {}: {}", id, WatchError::NotFound(id.0));
            return None;
        };
        if state.registry.remove(&entity.symbol) {
            state.request(Request::Unsubscribe(entity.symbol.clone()));
        }
        self.shared.hub.publish(ChangeEvent::Removed(entity.clone()));
        Some(entity)
    }

    /// Snapshot, most recently added first.
    pub fn list_all(&self) -> Vec<WatchedEntity> {
        self.shared
            .state
            .lock()
            .map(|state| state.collection.list_all())
            .unwrap_or_default()
    }

    pub fn get(&self, id: EntityId) -> Option<WatchedEntity> {
        let state = self.shared.state.lock().ok()?;
        state.collection.get(id).cloned()
    }

    /// The entity followed by the foreground notification.
    pub fn observed(&self) -> Option<WatchedEntity> {
        let state = self.shared.state.lock().ok()?;
        state.collection.observed().cloned()
    }

    /// Follows the change stream from now on.
    pub fn subscribe(&self) -> ChangeStream {
        self.shared.hub.subscribe()
    }

    /// Applies a tick directly. Ticks for symbols that are not subscribed are
    /// dropped.
    pub fn apply_tick(&self, tick: &Tick) -> TickOutcome {
        let Ok(mut state) = self.shared.state.lock() else {
            return TickOutcome::Stale;
        };
        let state = &mut *state;
        let outcome = reconcile(&mut state.registry, &mut state.collection, tick);
        if let Some(event) = outcome.clone().into_event() {
            self.shared.hub.publish(event);
        }
        outcome
    }

    /// Re-reads the day quote of an entity through the REST source.
    pub fn refresh_quote(&self, id: EntityId) -> Result<WatchedEntity> {
        let symbol = self
            .get(id)
            .map(|entity| entity.symbol)
            .ok_or(WatchError::NotFound(id.0))?;
        let profile = self.rest.fetch_profile(&symbol)?;
        self.apply_quote(id, profile.open_price, profile.current_price)
    }

    fn apply_quote(&self, id: EntityId, open_price: f64, current_price: f64) -> Result<WatchedEntity> {
        let mut state = self.shared.state.lock()?;
        let entity = state
            .collection
            .apply_quote(id, open_price, current_price)
            .ok_or(WatchError::NotFound(id.0))?;
        self.shared.hub.publish(ChangeEvent::PriceUpdated {
            entity_id: id,
            new_price: current_price,
            profit_percent: entity.profit_percent(current_price),
        });
        Ok(entity)
    }

    pub fn candles(&self, symbol: &str, range: TimeRange) -> Result<Vec<Candle>> {
        Ok(self.rest.fetch_candles(symbol, range)?)
    }

    pub fn news(&self, symbol: &str, range: TimeRange) -> Result<Vec<NewsItem>> {
        Ok(self.rest.fetch_news(symbol, range)?)
    }

    /// Opens the live connection and resubscribes every watched symbol.
    pub fn open(&self) -> Result<()> {
        self.connection.open(&self.shared)
    }

    /// Closes the live connection.
    pub fn close(&self) -> Result<()> {
        self.connection.close(&self.shared)
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn symbol_state(&self, symbol: &str) -> SymbolState {
        self.shared
            .state
            .lock()
            .map(|state| state.registry.state_of(symbol))
            .unwrap_or(SymbolState::Unsubscribed)
    }

    /// Size of the subscription set.
    pub fn subscription_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .map(|state| state.registry.len())
            .unwrap_or(0)
    }

    /// Waits until every queued persistence operation has been applied.
    pub fn flush(&self) -> Result<()> {
        self.writer.persister().flush()
    }
}

impl Drop for Watchlist {
    fn drop(&mut self) {
        if let Err(e) = self.connection.close(&self.shared) {
            debug!("Close on drop failed: {}", e);
        }
    }
}
