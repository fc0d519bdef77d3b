//! Subscription registry.
//!
//! Tracks which symbols are subscribed at the push source, maps each of them
//! to the watched entity it feeds, and enforces the subscription cap at add
//! time. The registry never talks to the push source itself: every mutation
//! returns what request, if any, the caller has to issue.
//!
//! While the connection is closed, accepted adds are held as *pending*. They
//! count toward the cap but are not subscribed; the next
//! [`SubscriptionRegistry::resubscribe_all`] turns them into subscriptions.
use std::collections::HashMap;

use strum_macros::Display;
use watch_common::WatchError;

use crate::entity::{EntityId, WatchedEntity};

/// Live state of one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SymbolState {
    Unsubscribed,
    Subscribed,
    ReceivingTicks,
}

/// Outcome of an accepted add.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Newly subscribed; a subscribe request must be sent.
    Subscribe,
    /// Connection closed; held until the next resubscribe.
    Pending,
    /// Symbol was already registered; nothing to send.
    AlreadyRegistered,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    entity_id: EntityId,
    state: SymbolState,
}

#[derive(Debug)]
pub struct SubscriptionRegistry {
    cap: usize,
    online: bool,
    subscribed: HashMap<String, Entry>,
    pending: HashMap<String, EntityId>,
}

impl SubscriptionRegistry {
    /// Empty, offline registry with the given cap.
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            online: false,
            subscribed: HashMap::new(),
            pending: HashMap::new(),
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Registers `symbol` for `entity_id`.
    ///
    /// Fails with [`WatchError::CapExceeded`] when the cap is reached and
    /// `force` is not set. Forced adds are only used when re-subscribing
    /// entities that were admitted earlier.
    pub fn add(
        &mut self,
        symbol: &str,
        entity_id: EntityId,
        force: bool,
    ) -> Result<Admission, WatchError> {
        if self.subscribed.contains_key(symbol) || self.pending.contains_key(symbol) {
            return Ok(Admission::AlreadyRegistered);
        }
        if !force {
            self.check_capacity()?;
        }
        if self.online {
            self.subscribed.insert(
                symbol.to_string(),
                Entry {
                    entity_id,
                    state: SymbolState::Subscribed,
                },
            );
            Ok(Admission::Subscribe)
        } else {
            self.pending.insert(symbol.to_string(), entity_id);
            Ok(Admission::Pending)
        }
    }

    /// Fails with [`WatchError::CapExceeded`] when a non-forced add would be
    /// rejected.
    pub fn check_capacity(&self) -> Result<(), WatchError> {
        if self.occupied() >= self.cap {
            return Err(WatchError::CapExceeded { limit: self.cap });
        }
        Ok(())
    }

    /// Forgets `symbol`. Returns `true` when an unsubscribe request must be
    /// sent. Removing an unknown symbol is a no-op.
    pub fn remove(&mut self, symbol: &str) -> bool {
        self.pending.remove(symbol);
        self.subscribed.remove(symbol).is_some()
    }

    /// Marks the connection open and rebuilds the set from `entities`.
    ///
    /// Every entity is force-added in `display_order` descending sequence; the
    /// returned symbols are the subscribe requests to send, in that order.
    pub fn resubscribe_all(&mut self, entities: &[WatchedEntity]) -> Vec<String> {
        self.online = true;
        self.subscribed.clear();
        self.pending.clear();

        let mut ordered: Vec<&WatchedEntity> = entities.iter().collect();
        ordered.sort_by(|a, b| b.display_order.cmp(&a.display_order));

        let mut requests = Vec::with_capacity(ordered.len());
        for entity in ordered {
            if let Ok(Admission::Subscribe) = self.add(&entity.symbol, entity.id, true) {
                requests.push(entity.symbol.clone());
            }
        }
        requests
    }

    /// Rebuilds the pending set from `entities` while the connection is
    /// closed. Every entity is admitted without a cap check, so later adds are
    /// checked against the restored symbols.
    pub fn hold_pending(&mut self, entities: &[WatchedEntity]) {
        self.subscribed.clear();
        self.pending.clear();
        for entity in entities {
            self.pending.insert(entity.symbol.clone(), entity.id);
        }
    }

    /// Marks the connection closed. The set is cleared without unsubscribe
    /// requests; its symbols stay admitted as pending.
    pub fn disconnect(&mut self) {
        self.online = false;
        for (symbol, entry) in self.subscribed.drain() {
            self.pending.insert(symbol, entry.entity_id);
        }
    }

    pub fn state_of(&self, symbol: &str) -> SymbolState {
        self.subscribed
            .get(symbol)
            .map(|entry| entry.state)
            .unwrap_or(SymbolState::Unsubscribed)
    }

    /// Records that a tick was accepted for `symbol`.
    pub fn mark_receiving(&mut self, symbol: &str) {
        if let Some(entry) = self.subscribed.get_mut(symbol) {
            entry.state = SymbolState::ReceivingTicks;
        }
    }

    /// Entity fed by a subscribed symbol.
    pub fn entity_for(&self, symbol: &str) -> Option<EntityId> {
        self.subscribed.get(symbol).map(|entry| entry.entity_id)
    }

    /// Size of the subscription set.
    pub fn len(&self) -> usize {
        self.subscribed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribed.is_empty()
    }

    /// Subscribed plus pending symbols: what the cap is checked against.
    pub fn occupied(&self) -> usize {
        self.subscribed.len() + self.pending.len()
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Subscribed symbols, sorted.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.subscribed.keys().cloned().collect();
        symbols.sort();
        symbols
    }
}
