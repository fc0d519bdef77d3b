mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{BlockingPush, FakeRest, WAIT, eventually, harness, harness_with, next_price};
use crossbeam_channel::bounded;
use watch_common::market::TimeRange;
use watch_common::{RestFailure, Tick, WatchError};
use watch_core::{
    ChangeEvent, ConnectionState, EntityId, JsonFileStore, MAX_SUBSCRIPTIONS, MemoryStore,
    PersistentStore, SymbolState, TickOutcome, WatchConfig, WatchContext, WatchedEntity,
    Watchlist,
};

fn symbols(h: &common::Harness) -> Vec<String> {
    h.watchlist.list_all().into_iter().map(|e| e.symbol).collect()
}

#[test]
fn fifty_first_add_is_capped_until_a_slot_frees() {
    let h = harness();
    h.watchlist.open().unwrap();

    let mut ids = Vec::new();
    ids.push(h.watchlist.add("AAPL", 100.0).unwrap().id);
    for i in 2..=MAX_SUBSCRIPTIONS {
        ids.push(h.watchlist.add(&format!("ZZZ{i}"), 10.0).unwrap().id);
    }
    assert_eq!(h.watchlist.list_all().len(), 50);

    let err = h.watchlist.add("XYZ", 1.0).unwrap_err();
    assert!(matches!(err, WatchError::CapExceeded { limit: 50 }));
    assert_eq!(h.watchlist.subscription_count(), 50);

    h.watchlist.remove(ids[10]).unwrap();
    let added = h.watchlist.add("XYZ", 1.0).unwrap();
    assert_eq!(h.watchlist.list_all()[0].id, added.id);
    assert!(h.watchlist.subscription_count() <= MAX_SUBSCRIPTIONS);
}

#[test]
fn concurrent_adds_never_exceed_the_cap() {
    let h = Arc::new(harness());
    h.watchlist.open().unwrap();

    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let h = Arc::clone(&h);
            thread::spawn(move || {
                for i in 0..30 {
                    let _ = h.watchlist.add(&format!("W{worker}-{i}"), 1.0);
                    assert!(h.watchlist.subscription_count() <= MAX_SUBSCRIPTIONS);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }
    assert_eq!(h.watchlist.list_all().len(), MAX_SUBSCRIPTIONS);
    assert_eq!(h.watchlist.subscription_count(), MAX_SUBSCRIPTIONS);
}

#[test]
fn tick_yields_profit_against_open_price() {
    let h = harness();
    let stream = h.watchlist.subscribe();
    h.watchlist.open().unwrap();
    let aapl = h.watchlist.add("AAPL", 100.0).unwrap();

    h.push.push("AAPL", 110.0);
    let (price, profit) = next_price(&stream).expect("no price update");
    assert_eq!(price, 110.0);
    assert!((profit - 0.10).abs() < 1e-12);
    assert_eq!(h.watchlist.get(aapl.id).unwrap().last_known_price, 110.0);
    assert_eq!(h.watchlist.symbol_state("AAPL"), SymbolState::ReceivingTicks);
}

#[test]
fn ticks_for_unwatched_symbols_change_nothing() {
    let h = harness();
    let stream = h.watchlist.subscribe();
    h.watchlist.open().unwrap();
    h.watchlist.add("AAPL", 100.0).unwrap();
    let before = h.watchlist.list_all();

    h.push.push("MSFT", 1.0);
    h.push.push("AAPL", 101.0);
    let (price, _) = next_price(&stream).unwrap();
    assert_eq!(price, 101.0);

    let after = h.watchlist.list_all();
    assert_eq!(after.len(), before.len());
    assert_eq!(h.watchlist.apply_tick(&Tick::new("MSFT", 3.0, 0)), TickOutcome::Stale);
}

#[test]
fn last_write_wins_with_delays() {
    let h = harness();
    h.watchlist.open().unwrap();
    let aapl = h.watchlist.add("AAPL", 100.0).unwrap();

    thread::sleep(Duration::from_millis(30));
    h.watchlist.apply_tick(&Tick::new("AAPL", 120.0, 50));
    thread::sleep(Duration::from_millis(30));
    h.watchlist.apply_tick(&Tick::new("AAPL", 95.0, 1));
    assert_eq!(h.watchlist.get(aapl.id).unwrap().last_known_price, 95.0);

    let stream = h.watchlist.subscribe();
    h.push.push("AAPL", 130.0);
    thread::sleep(Duration::from_millis(30));
    h.push.push("AAPL", 80.0);
    next_price(&stream).unwrap();
    assert_eq!(next_price(&stream).unwrap().0, 80.0);
    assert_eq!(h.watchlist.get(aapl.id).unwrap().last_known_price, 80.0);
}

#[test]
fn stray_tick_after_close_is_dropped() {
    let h = harness();
    let stream = h.watchlist.subscribe();
    h.watchlist.open().unwrap();
    let aapl = h.watchlist.add("AAPL", 100.0).unwrap();
    h.push.push("AAPL", 105.0);
    next_price(&stream).unwrap();

    let stale_sender = h.push.sender().unwrap();
    h.watchlist.close().unwrap();
    assert_eq!(h.watchlist.connection_state(), ConnectionState::Closed);
    assert_eq!(h.watchlist.subscription_count(), 0);

    let _ = stale_sender.send(Tick::new("AAPL", 999.0, 0));
    assert_eq!(
        h.watchlist.apply_tick(&Tick::new("AAPL", 999.0, 0)),
        TickOutcome::Stale
    );
    thread::sleep(Duration::from_millis(50));
    assert_eq!(h.watchlist.get(aapl.id).unwrap().last_known_price, 105.0);
}

#[test]
fn close_sends_no_unsubscribes() {
    let h = harness();
    h.watchlist.open().unwrap();
    h.watchlist.add("AAPL", 1.0).unwrap();
    h.watchlist.add("MSFT", 1.0).unwrap();
    assert!(eventually(|| h.push.requests().len() == 2));

    h.watchlist.close().unwrap();
    assert_eq!(h.push.requests(), vec!["+AAPL", "+MSFT"]);
    assert_eq!(h.push.closes(), 1);
}

#[test]
fn reconnect_resubscribes_in_display_order_and_keeps_order() {
    let h = harness();
    h.watchlist.open().unwrap();
    for symbol in ["A", "B", "C"] {
        h.watchlist.add(symbol, 1.0).unwrap();
    }
    let before = symbols(&h);
    assert_eq!(before, vec!["C", "B", "A"]);

    h.watchlist.close().unwrap();
    h.push.clear_requests();
    h.watchlist.open().unwrap();

    assert!(eventually(|| h.push.requests().len() == 3));
    assert_eq!(h.push.requests(), vec!["+C", "+B", "+A"]);
    assert_eq!(symbols(&h), before);
    assert_eq!(h.watchlist.subscription_count(), 3);
}

#[test]
fn removing_observed_promotes_next_most_recent() {
    let h = harness();
    let a = h.watchlist.add("A", 1.0).unwrap();
    let b = h.watchlist.add("B", 1.0).unwrap();
    assert_eq!(h.watchlist.observed().unwrap().id, b.id);

    h.watchlist.remove(b.id).unwrap();
    assert_eq!(h.watchlist.observed().unwrap().id, a.id);
    h.watchlist.remove(a.id).unwrap();
    assert!(h.watchlist.observed().is_none());
}

#[test]
fn remove_unsubscribes_and_unknown_remove_is_a_noop() {
    let h = harness();
    let stream = h.watchlist.subscribe();
    h.watchlist.open().unwrap();
    let aapl = h.watchlist.add("AAPL", 1.0).unwrap();

    let removed = h.watchlist.remove(aapl.id).unwrap();
    assert_eq!(removed.symbol, "AAPL");
    assert!(h.watchlist.remove(aapl.id).is_none());
    assert!(eventually(|| h.push.requests() == vec!["+AAPL", "-AAPL"]));

    let events: Vec<ChangeEvent> = stream.drain();
    assert!(events.contains(&ChangeEvent::Added(aapl.clone())));
    assert!(events.iter().any(|e| matches!(e, ChangeEvent::Removed(r) if r.id == aapl.id)));
}

#[test]
fn close_cuts_short_a_blocked_subscribe() {
    let push = Arc::new(BlockingPush::new());
    let watchlist = Watchlist::new(WatchContext {
        store: Arc::new(MemoryStore::new()),
        push: push.clone(),
        rest: Arc::new(FakeRest::default()),
        config: WatchConfig::default(),
    });
    watchlist.open().unwrap();
    watchlist.add("AAPL", 1.0).unwrap();
    assert!(push.wait_until_blocked());

    let (done_tx, done_rx) = bounded(1);
    thread::spawn(move || {
        let closed = watchlist.close();
        let _ = done_tx.send((closed, watchlist.connection_state()));
    });
    let (closed, state) = done_rx.recv_timeout(WAIT).expect("close() hung on the blocked subscribe");
    assert!(closed.is_ok());
    assert_eq!(state, ConnectionState::Closed);
}

#[test]
fn concurrent_opens_collapse_into_one_attempt() {
    let h = Arc::new(harness());
    let callers: Vec<_> = (0..8)
        .map(|_| {
            let h = Arc::clone(&h);
            thread::spawn(move || h.watchlist.open().unwrap())
        })
        .collect();
    for caller in callers {
        caller.join().unwrap();
    }
    assert_eq!(h.push.opens(), 1);
    assert_eq!(h.watchlist.connection_state(), ConnectionState::Open);
}

#[test]
fn failed_open_reports_connection_failure_without_retry() {
    let h = harness();
    let stream = h.watchlist.subscribe();
    h.push.fail_next_open();

    let err = h.watchlist.open().unwrap_err();
    assert!(matches!(err, WatchError::ConnectionFailure(_)));
    assert_eq!(h.watchlist.connection_state(), ConnectionState::Closed);
    assert_eq!(h.push.opens(), 1);
    assert_eq!(
        stream.drain(),
        vec![
            ChangeEvent::Connection(ConnectionState::Connecting),
            ChangeEvent::Connection(ConnectionState::Closed),
        ]
    );

    h.watchlist.open().unwrap();
    assert_eq!(h.watchlist.connection_state(), ConnectionState::Open);
}

#[test]
fn lost_stream_closes_until_reopened() {
    let h = harness();
    let stream = h.watchlist.subscribe();
    h.watchlist.open().unwrap();
    let aapl = h.watchlist.add("AAPL", 100.0).unwrap();

    h.push.lose_connection();
    let mut seen = Vec::new();
    assert!(eventually(|| {
        seen.extend(stream.drain());
        seen.contains(&ChangeEvent::Connection(ConnectionState::Closed))
    }));
    assert_eq!(h.watchlist.connection_state(), ConnectionState::Closed);
    assert_eq!(h.watchlist.subscription_count(), 0);
    assert_eq!(h.push.opens(), 1);

    h.watchlist.open().unwrap();
    h.push.push("AAPL", 120.0);
    assert_eq!(next_price(&stream).unwrap().0, 120.0);
    assert_eq!(h.watchlist.get(aapl.id).unwrap().last_known_price, 120.0);
}

#[test]
fn offline_adds_are_pending_and_subscribed_on_open() {
    let h = harness_with(
        Arc::new(MemoryStore::new()),
        FakeRest::default(),
        WatchConfig {
            max_subscriptions: 2,
            ..WatchConfig::default()
        },
    );
    h.watchlist.add("A", 1.0).unwrap();
    h.watchlist.add("B", 1.0).unwrap();
    assert!(matches!(
        h.watchlist.add("C", 1.0),
        Err(WatchError::CapExceeded { limit: 2 })
    ));
    assert_eq!(h.watchlist.subscription_count(), 0);
    assert_eq!(h.watchlist.symbol_state("A"), SymbolState::Unsubscribed);
    assert!(h.push.requests().is_empty());

    h.watchlist.open().unwrap();
    assert!(eventually(|| h.push.requests() == vec!["+B", "+A"]));
    assert_eq!(h.watchlist.symbol_state("A"), SymbolState::Subscribed);
}

#[test]
fn restored_entities_count_toward_the_cap_while_offline() {
    let persisted = (0..MAX_SUBSCRIPTIONS as u64).map(|i| WatchedEntity {
        id: EntityId(i + 1),
        symbol: format!("S{i}"),
        display_order: i as i64,
        last_known_price: 1.0,
        open_price_at_subscribe: 1.0,
    });
    let h = harness_with(
        Arc::new(MemoryStore::with_entities(persisted)),
        FakeRest::default(),
        WatchConfig::default(),
    );
    assert_eq!(h.watchlist.restore().unwrap(), MAX_SUBSCRIPTIONS);

    assert!(matches!(
        h.watchlist.add("XYZ", 1.0),
        Err(WatchError::CapExceeded { limit }) if limit == MAX_SUBSCRIPTIONS
    ));
    assert_eq!(h.watchlist.list_all().len(), MAX_SUBSCRIPTIONS);

    h.watchlist.open().unwrap();
    assert!(eventually(|| h.push.requests().len() == MAX_SUBSCRIPTIONS));
    assert_eq!(h.watchlist.subscription_count(), MAX_SUBSCRIPTIONS);
    assert_eq!(h.push.requests().first().map(String::as_str), Some("+S49"));
}

#[test]
fn adding_a_watched_symbol_returns_the_existing_entity() {
    let h = harness();
    let first = h.watchlist.add("AAPL", 100.0).unwrap();
    let again = h.watchlist.add("AAPL", 50.0).unwrap();
    assert_eq!(first, again);
    assert_eq!(h.watchlist.list_all().len(), 1);
}

#[test]
fn slow_observer_does_not_block_delivery() {
    let h = harness_with(
        Arc::new(MemoryStore::new()),
        FakeRest::default(),
        WatchConfig {
            observer_buffer: 2,
            ..WatchConfig::default()
        },
    );
    let _never_read = h.watchlist.subscribe();
    let reader = h.watchlist.subscribe();
    h.watchlist.open().unwrap();
    h.watchlist.add("AAPL", 100.0).unwrap();
    reader.drain();

    for i in 1..=20 {
        h.push.push("AAPL", 100.0 + i as f64);
        assert_eq!(next_price(&reader).unwrap().0, 100.0 + i as f64);
    }
}

#[test]
fn structural_changes_are_persisted_and_restored() {
    let path = std::env::temp_dir().join(format!(
        "watchlist-it-{}.json",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    ));
    {
        let h = harness_with(
            Arc::new(JsonFileStore::new(&path)),
            FakeRest::default(),
            WatchConfig::default(),
        );
        h.watchlist.open().unwrap();
        let a = h.watchlist.add("A", 10.0).unwrap();
        h.watchlist.add("B", 20.0).unwrap();
        h.watchlist.add("C", 30.0).unwrap();
        h.watchlist.remove(a.id).unwrap();
        h.push.push("B", 25.0);
        assert!(eventually(|| h.watchlist.list_all()[1].last_known_price == 25.0));
        h.watchlist.close().unwrap();
        h.watchlist.flush().unwrap();
    }

    let h = harness_with(
        Arc::new(JsonFileStore::new(&path)),
        FakeRest::default(),
        WatchConfig::default(),
    );
    assert_eq!(h.watchlist.restore().unwrap(), 2);
    std::fs::remove_file(&path).ok();

    let restored = h.watchlist.list_all();
    assert_eq!(
        restored.iter().map(|e| e.symbol.as_str()).collect::<Vec<_>>(),
        vec!["C", "B"]
    );
    assert_eq!(restored[1].last_known_price, 25.0);
    assert_eq!(h.watchlist.observed().unwrap().symbol, "C");

    h.watchlist.open().unwrap();
    assert!(eventually(|| h.push.requests() == vec!["+C", "+B"]));
}

#[test]
fn profile_lookups_feed_open_and_current_price() {
    let h = harness_with(
        Arc::new(MemoryStore::new()),
        FakeRest::with_profile("AAPL", 100.0, 104.0),
        WatchConfig::default(),
    );
    let entity = h.watchlist.add_from_profile("AAPL").unwrap();
    assert_eq!(entity.open_price_at_subscribe, 100.0);
    assert_eq!(entity.last_known_price, 104.0);

    h.rest.set_profile("AAPL", 100.0, 90.0);
    let stream = h.watchlist.subscribe();
    let refreshed = h.watchlist.refresh_quote(entity.id).unwrap();
    assert_eq!(refreshed.last_known_price, 90.0);
    let (price, profit) = next_price(&stream).unwrap();
    assert_eq!(price, 90.0);
    assert!((profit + 0.10).abs() < 1e-12);

    h.watchlist.flush().unwrap();
    assert_eq!(h.store.get(entity.id).unwrap().unwrap().last_known_price, 90.0);
}

#[test]
fn rest_failures_are_typed() {
    let h = harness();
    assert!(matches!(
        h.watchlist.add_from_profile("NOPE"),
        Err(WatchError::Rest(RestFailure::NotFound(_)))
    ));
    *h.rest.limited.lock().unwrap() = true;
    let entity = h.watchlist.add("AAPL", 1.0).unwrap();
    assert!(matches!(
        h.watchlist.refresh_quote(entity.id),
        Err(WatchError::Rest(RestFailure::Limit))
    ));
    assert!(matches!(
        h.watchlist.news("AAPL", TimeRange::new(0, 10)),
        Err(WatchError::Rest(RestFailure::Unsupported))
    ));
    assert_eq!(h.watchlist.candles("AAPL", TimeRange::new(5, 10)).unwrap()[0].timestamp, 5);
}
