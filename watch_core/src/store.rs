//! Cached collection store.
//!
//! The ordered, id-indexed in-memory mirror of the persisted watchlist. It is
//! the source of truth for observers; every structural change is queued to the
//! persistence writer and never waits for it.
//!
//! Iteration order is `display_order` descending, i.e. most recently added
//! first. The collection also tracks the *observed* entity, the one followed
//! by a foreground notification: a newly added entity becomes observed, and
//! removing the observed entity promotes the next one in iteration order.
//!
//! The store has no size limit; the cap lives in the subscription registry.
use std::collections::HashMap;

use log::debug;

use crate::entity::{EntityId, WatchedEntity};
use crate::persist::Persister;

pub struct CachedCollection {
    entities: HashMap<EntityId, WatchedEntity>,
    /// Ids in iteration order.
    order: Vec<EntityId>,
    by_symbol: HashMap<String, EntityId>,
    observed: Option<EntityId>,
    next_id: u64,
    persister: Persister,
}

impl CachedCollection {
    pub fn new(persister: Persister) -> Self {
        Self {
            entities: HashMap::new(),
            order: Vec::new(),
            by_symbol: HashMap::new(),
            observed: None,
            next_id: 1,
            persister,
        }
    }

    /// Replaces the content with `entities` loaded from the persistent store.
    /// Only duplicates are written back: for a symbol persisted more than once
    /// the most recent entity is kept and the others are deleted.
    pub fn restore(&mut self, entities: Vec<WatchedEntity>) {
        self.entities.clear();
        self.order.clear();
        self.by_symbol.clear();

        let mut entities = entities;
        entities.sort_by(|a, b| {
            b.display_order
                .cmp(&a.display_order)
                .then_with(|| b.id.cmp(&a.id))
        });
        for entity in entities {
            if self.by_symbol.contains_key(&entity.symbol) {
                debug!(
                    "Dropping duplicate persisted symbol {} ({})",
                    entity.symbol, entity.id
                );
                self.persister.delete(entity.id);
                continue;
            }
            self.next_id = self.next_id.max(entity.id.0 + 1);
            self.order.push(entity.id);
            self.by_symbol.insert(entity.symbol.clone(), entity.id);
            self.entities.insert(entity.id, entity);
        }
        self.observed = self.order.first().copied();
    }

    /// Adds a new entity in front of the collection and makes it observed.
    pub fn insert_front(&mut self, symbol: &str, open_price: f64) -> WatchedEntity {
        let display_order = self
            .order
            .first()
            .and_then(|id| self.entities.get(id))
            .map(|e| e.display_order + 1)
            .unwrap_or(0);
        let id = EntityId(self.next_id);
        self.next_id += 1;

        let entity = WatchedEntity {
            id,
            symbol: symbol.to_string(),
            display_order,
            last_known_price: open_price,
            open_price_at_subscribe: open_price,
        };
        self.order.insert(0, id);
        self.by_symbol.insert(entity.symbol.clone(), id);
        self.entities.insert(id, entity.clone());
        self.observed = Some(id);

        self.persister.put(entity.clone());
        entity
    }

    /// Removes an entity. Unknown ids are a logged no-op.
    pub fn remove(&mut self, id: EntityId) -> Option<WatchedEntity> {
        let Some(entity) = self.entities.remove(&id) else {
            debug!("Remove of unknown entity {}", id);
            return None;
        };
        self.order.retain(|other| *other != id);
        self.by_symbol.remove(&entity.symbol);
        if self.observed == Some(id) {
            self.observed = self.order.first().copied();
        }

        self.persister.delete(id);
        Some(entity)
    }

    /// Overwrites the last known price. Order is unchanged.
    pub fn apply_tick(&mut self, id: EntityId, new_price: f64) -> Option<&WatchedEntity> {
        match self.entities.get_mut(&id) {
            Some(entity) => {
                entity.last_known_price = new_price;
                Some(entity)
            }
            None => {
                debug!("Tick for unknown entity {}", id);
                None
            }
        }
    }

    /// Applies a fresh quote from a profile lookup and persists it.
    pub fn apply_quote(
        &mut self,
        id: EntityId,
        open_price: f64,
        current_price: f64,
    ) -> Option<WatchedEntity> {
        let entity = self.entities.get_mut(&id)?;
        entity.open_price_at_subscribe = open_price;
        entity.last_known_price = current_price;
        let entity = entity.clone();
        self.persister.put(entity.clone());
        Some(entity)
    }

    /// Snapshot in iteration order.
    pub fn list_all(&self) -> Vec<WatchedEntity> {
        self.order
            .iter()
            .filter_map(|id| self.entities.get(id))
            .cloned()
            .collect()
    }

    /// Queues every entity for persistence.
    pub fn persist_snapshot(&self) {
        for entity in self.list_all() {
            self.persister.put(entity);
        }
    }

    pub fn get(&self, id: EntityId) -> Option<&WatchedEntity> {
        self.entities.get(&id)
    }

    pub fn find_by_symbol(&self, symbol: &str) -> Option<&WatchedEntity> {
        self.by_symbol
            .get(symbol)
            .and_then(|id| self.entities.get(id))
    }

    pub fn observed(&self) -> Option<&WatchedEntity> {
        self.observed.and_then(|id| self.entities.get(&id))
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
