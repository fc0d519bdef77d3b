//! Live update reconciler: applies ticks to the cached collection.
//!
//! Prices are last-write-wins. The feed carries no monotonic sequence for
//! prices, so every accepted tick overwrites `last_known_price` whatever order
//! ticks arrive in. Prices are not validated; zero and negative values are
//! applied as received.
use log::debug;
use watch_common::Tick;

use crate::entity::EntityId;
use crate::hub::ChangeEvent;
use crate::registry::{SubscriptionRegistry, SymbolState};
use crate::store::CachedCollection;

/// What happened to a tick.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Applied {
        entity_id: EntityId,
        new_price: f64,
        profit_percent: f64,
    },
    /// The symbol is not subscribed (late tick after an unsubscribe or close).
    Stale,
    /// Subscribed, but no entity watches the symbol.
    Orphaned,
}

impl TickOutcome {
    /// The change notification for an applied tick.
    pub fn into_event(self) -> Option<ChangeEvent> {
        match self {
            TickOutcome::Applied {
                entity_id,
                new_price,
                profit_percent,
            } => Some(ChangeEvent::PriceUpdated {
                entity_id,
                new_price,
                profit_percent,
            }),
            TickOutcome::Stale | TickOutcome::Orphaned => None,
        }
    }
}

/// Applies `tick` if its symbol is live. Dropped ticks leave both the
/// registry and the collection untouched.
pub fn reconcile(
    registry: &mut SubscriptionRegistry,
    collection: &mut CachedCollection,
    tick: &Tick,
) -> TickOutcome {
    if registry.state_of(&tick.symbol) == SymbolState::Unsubscribed {
        debug!("Dropping stale tick for {}", tick.symbol);
        return TickOutcome::Stale;
    }
    let Some(entity_id) = collection.find_by_symbol(&tick.symbol).map(|e| e.id) else {
        debug!("Dropping tick for {}: no watched entity", tick.symbol);
        return TickOutcome::Orphaned;
    };
    let Some(entity) = collection.apply_tick(entity_id, tick.price) else {
        return TickOutcome::Orphaned;
    };
    let profit_percent = entity.profit_percent(tick.price);
    registry.mark_receiving(&tick.symbol);

    TickOutcome::Applied {
        entity_id,
        new_price: tick.price,
        profit_percent,
    }
}

/// Signed percentage label, e.g. `+10.00%`.
pub fn profit_label(profit_percent: f64) -> String {
    format!("{:+.2}%", profit_percent * 100.0)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::persist::PersistenceWriter;
    use crate::storage::MemoryStore;

    struct Fixture {
        registry: SubscriptionRegistry,
        collection: CachedCollection,
        _writer: PersistenceWriter,
    }

    fn fixture() -> Fixture {
        let writer = PersistenceWriter::start(Arc::new(MemoryStore::new()));
        let mut registry = SubscriptionRegistry::new(50);
        registry.resubscribe_all(&[]);
        Fixture {
            registry,
            collection: CachedCollection::new(writer.persister()),
            _writer: writer,
        }
    }

    fn watch(f: &mut Fixture, symbol: &str, open: f64) -> EntityId {
        let entity = f.collection.insert_front(symbol, open);
        f.registry.add(symbol, entity.id, false).unwrap();
        entity.id
    }

    #[test]
    fn computes_profit_against_open_price() {
        let mut f = fixture();
        let id = watch(&mut f, "AAPL", 100.0);
        let outcome = reconcile(&mut f.registry, &mut f.collection, &Tick::new("AAPL", 110.0, 1));

        let TickOutcome::Applied {
            entity_id,
            new_price,
            profit_percent,
        } = outcome
        else {
            panic!("tick not applied: {outcome:?}");
        };
        assert_eq!(entity_id, id);
        assert_eq!(new_price, 110.0);
        assert!((profit_percent - 0.10).abs() < 1e-12);
        assert_eq!(f.registry.state_of("AAPL"), SymbolState::ReceivingTicks);
    }

    #[test]
    fn last_write_wins_regardless_of_sequence_hint() {
        let mut f = fixture();
        let id = watch(&mut f, "AAPL", 100.0);
        reconcile(&mut f.registry, &mut f.collection, &Tick::new("AAPL", 120.0, 9));
        reconcile(&mut f.registry, &mut f.collection, &Tick::new("AAPL", 90.0, 1));
        assert_eq!(f.collection.get(id).unwrap().last_known_price, 90.0);
    }

    #[test]
    fn unsubscribed_symbol_is_stale_and_changes_nothing() {
        let mut f = fixture();
        let id = watch(&mut f, "AAPL", 100.0);
        f.registry.remove("AAPL");
        let before = f.collection.list_all();

        let outcome = reconcile(&mut f.registry, &mut f.collection, &Tick::new("AAPL", 1.0, 1));
        assert_eq!(outcome, TickOutcome::Stale);
        assert_eq!(f.collection.list_all(), before);
        assert_eq!(f.collection.get(id).unwrap().last_known_price, 100.0);
    }

    #[test]
    fn non_positive_prices_are_applied() {
        let mut f = fixture();
        let id = watch(&mut f, "AAPL", 100.0);
        let outcome = reconcile(&mut f.registry, &mut f.collection, &Tick::new("AAPL", -5.0, 1));
        assert!(matches!(outcome, TickOutcome::Applied { .. }));
        assert_eq!(f.collection.get(id).unwrap().last_known_price, -5.0);
    }

    #[test]
    fn zero_open_price_reports_flat_profit() {
        let mut f = fixture();
        watch(&mut f, "FREE", 0.0);
        let outcome = reconcile(&mut f.registry, &mut f.collection, &Tick::new("FREE", 3.0, 1));
        let event = outcome.into_event().unwrap();
        assert!(matches!(
            event,
            ChangeEvent::PriceUpdated { profit_percent, .. } if profit_percent == 0.0
        ));
    }

    #[test]
    fn formats_signed_labels() {
        assert_eq!(profit_label(0.10), "+10.00%");
        assert_eq!(profit_label(-0.0325), "-3.25%");
    }
}
