#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use watch_common::market::{Candle, CompanyProfile, NewsItem, TimeRange};
use watch_common::{RestFailure, Result, Tick, WatchError};
use watch_core::{
    ChangeEvent, ChangeStream, MemoryStore, PersistentStore, PushSource, RestSource, TickStream,
    WatchConfig, WatchContext, Watchlist,
};

pub const WAIT: Duration = Duration::from_secs(3);

#[derive(Default)]
struct PushInner {
    tick_tx: Option<Sender<Tick>>,
    requests: Vec<String>,
    opens: usize,
    closes: usize,
    fail_next_open: bool,
}

/// In-process push source recording every request.
#[derive(Default)]
pub struct FakePush {
    inner: Mutex<PushInner>,
}

impl FakePush {
    pub fn fail_next_open(&self) {
        self.inner.lock().unwrap().fail_next_open = true;
    }

    /// Sender of the current stream, if open.
    pub fn sender(&self) -> Option<Sender<Tick>> {
        self.inner.lock().unwrap().tick_tx.clone()
    }

    pub fn push(&self, symbol: &str, price: f64) {
        let tx = self.sender().expect("push source is not open");
        tx.send(Tick::new(symbol, price, 0)).unwrap();
    }

    /// Ends the stream as if the network went away.
    pub fn lose_connection(&self) {
        self.inner.lock().unwrap().tick_tx = None;
    }

    pub fn requests(&self) -> Vec<String> {
        self.inner.lock().unwrap().requests.clone()
    }

    pub fn clear_requests(&self) {
        self.inner.lock().unwrap().requests.clear();
    }

    pub fn opens(&self) -> usize {
        self.inner.lock().unwrap().opens
    }

    pub fn closes(&self) -> usize {
        self.inner.lock().unwrap().closes
    }
}

impl PushSource for FakePush {
    fn open(&self) -> Result<TickStream> {
        let mut inner = self.inner.lock().unwrap();
        // Widen the race window for concurrent open() callers.
        thread::sleep(Duration::from_millis(20));
        inner.opens += 1;
        if inner.fail_next_open {
            inner.fail_next_open = false;
            return Err(WatchError::ConnectionFailure("refused".into()));
        }
        let (tx, stream) = TickStream::channel();
        inner.tick_tx = Some(tx);
        Ok(stream)
    }

    fn subscribe(&self, symbol: &str) -> Result<()> {
        self.inner.lock().unwrap().requests.push(format!("+{symbol}"));
        Ok(())
    }

    fn unsubscribe(&self, symbol: &str) -> Result<()> {
        self.inner.lock().unwrap().requests.push(format!("-{symbol}"));
        Ok(())
    }

    fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closes += 1;
        inner.tick_tx = None;
    }
}

/// Push source whose `subscribe` blocks until the source is closed, like a
/// write stalled on a dead peer.
pub struct BlockingPush {
    release: Mutex<Option<Sender<()>>>,
    released: Receiver<()>,
    blocked_tx: Sender<()>,
    blocked_rx: Receiver<()>,
    tick_tx: Mutex<Option<Sender<Tick>>>,
}

impl BlockingPush {
    pub fn new() -> Self {
        let (release, released) = bounded(0);
        let (blocked_tx, blocked_rx) = unbounded();
        Self {
            release: Mutex::new(Some(release)),
            released,
            blocked_tx,
            blocked_rx,
            tick_tx: Mutex::new(None),
        }
    }

    /// Waits until a `subscribe` call is stuck.
    pub fn wait_until_blocked(&self) -> bool {
        self.blocked_rx.recv_timeout(WAIT).is_ok()
    }
}

impl PushSource for BlockingPush {
    fn open(&self) -> Result<TickStream> {
        let (tx, stream) = TickStream::channel();
        *self.tick_tx.lock().unwrap() = Some(tx);
        Ok(stream)
    }

    fn subscribe(&self, _symbol: &str) -> Result<()> {
        let _ = self.blocked_tx.send(());
        let _ = self.released.recv();
        Err(WatchError::ConnectionFailure("closed mid-write".into()))
    }

    fn unsubscribe(&self, _symbol: &str) -> Result<()> {
        Ok(())
    }

    fn close(&self) {
        self.release.lock().unwrap().take();
        self.tick_tx.lock().unwrap().take();
    }
}

/// REST source answering from a fixed profile table.
#[derive(Default)]
pub struct FakeRest {
    pub profiles: Mutex<Vec<CompanyProfile>>,
    pub limited: Mutex<bool>,
}

impl FakeRest {
    pub fn with_profile(symbol: &str, open_price: f64, current_price: f64) -> Self {
        let rest = FakeRest::default();
        rest.set_profile(symbol, open_price, current_price);
        rest
    }

    pub fn set_profile(&self, symbol: &str, open_price: f64, current_price: f64) {
        let mut profiles = self.profiles.lock().unwrap();
        profiles.retain(|p| p.symbol != symbol);
        profiles.push(CompanyProfile {
            symbol: symbol.into(),
            name: format!("{symbol} Inc."),
            currency: "USD".into(),
            open_price,
            current_price,
        });
    }
}

impl RestSource for FakeRest {
    fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, RestFailure> {
        if *self.limited.lock().unwrap() {
            return Err(RestFailure::Limit);
        }
        self.profiles
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.symbol == symbol)
            .cloned()
            .ok_or_else(|| RestFailure::NotFound(symbol.into()))
    }

    fn fetch_candles(&self, _symbol: &str, range: TimeRange) -> Result<Vec<Candle>, RestFailure> {
        Ok(vec![Candle {
            timestamp: range.from,
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            volume: 10.0,
        }])
    }

    fn fetch_news(&self, _symbol: &str, _range: TimeRange) -> Result<Vec<NewsItem>, RestFailure> {
        Err(RestFailure::Unsupported)
    }
}

pub struct Harness {
    pub watchlist: Watchlist,
    pub push: Arc<FakePush>,
    pub rest: Arc<FakeRest>,
    pub store: Arc<dyn PersistentStore>,
}

pub fn harness() -> Harness {
    harness_with(Arc::new(MemoryStore::new()), FakeRest::default(), WatchConfig::default())
}

pub fn harness_with(
    store: Arc<dyn PersistentStore>,
    rest: FakeRest,
    config: WatchConfig,
) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let push = Arc::new(FakePush::default());
    let rest = Arc::new(rest);
    let watchlist = Watchlist::new(WatchContext {
        store: Arc::clone(&store),
        push: push.clone(),
        rest: rest.clone(),
        config,
    });
    Harness {
        watchlist,
        push,
        rest,
        store,
    }
}

/// Polls `cond` until it holds or the wait expires.
pub fn eventually(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

/// Next price update on `stream`, skipping other events.
pub fn next_price(stream: &ChangeStream) -> Option<(f64, f64)> {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if let Some(ChangeEvent::PriceUpdated {
            new_price,
            profit_percent,
            ..
        }) = stream.recv_timeout(Duration::from_millis(50))
        {
            return Some((new_price, profit_percent));
        }
    }
    None
}
