//! Connection lifecycle manager.
//!
//! Owns the single logical connection to the push source:
//! `Closed -> Connecting -> Open -> Closed`. There is no reconnect loop; a
//! lost connection stays closed until someone calls [`ConnectionManager::open`]
//! again.
//!
//! An open connection runs two threads:
//! - the *pump* reads the tick stream and hands each tick to the reconciler,
//! - the *dispatcher* sends queued subscribe/unsubscribe requests to the push
//!   source, fire-and-forget.
//!
//! Both listen on a stop channel. `close()` drops it, closes the push source
//! and joins both threads, so no request or tick outlives the connection.
//! Every connection also gets an epoch; a tick is applied only if the epoch it
//! was read under is still current, which discards ticks racing a close.
//!
//! Lock order: gate, then status, then the collection state.
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded, select, unbounded};
use log::{debug, error, info, warn};
use strum_macros::Display;
use watch_common::{Result, WatchError};

use crate::hub::ChangeEvent;
use crate::source::{PushSource, TickStream};
use crate::watchlist::Shared;

/// Push-source connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
}

/// Request for the push source, queued while the collection lock is held.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Request {
    Subscribe(String),
    Unsubscribe(String),
}

struct ActiveConnection {
    stop_tx: Sender<()>,
    dispatcher: JoinHandle<()>,
    pump: JoinHandle<()>,
}

pub(crate) struct ConnectionManager {
    push: Arc<dyn PushSource>,
    gate: Mutex<Option<ActiveConnection>>,
    status: Arc<Mutex<ConnectionState>>,
}

impl ConnectionManager {
    pub(crate) fn new(push: Arc<dyn PushSource>) -> Self {
        Self {
            push,
            gate: Mutex::new(None),
            status: Arc::new(Mutex::new(ConnectionState::Closed)),
        }
    }

    pub(crate) fn state(&self) -> ConnectionState {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens the connection. Concurrent calls collapse: whoever finds the
    /// connection already `Connecting` or `Open` returns immediately.
    pub(crate) fn open(&self, shared: &Arc<Shared>) -> Result<()> {
        let mut active = self.gate.lock()?;
        if self.state() != ConnectionState::Closed {
            debug!("open() collapsed into the existing connection");
            return Ok(());
        }
        // Leftovers of a connection whose stream ended on its own.
        if let Some(stale) = active.take() {
            self.teardown(stale);
        }

        set_status(&self.status, shared, ConnectionState::Connecting);
        let ticks = match self.push.open() {
            Ok(ticks) => ticks,
            Err(e) => {
                error!("Failed to open push source: {}", e);
                set_status(&self.status, shared, ConnectionState::Closed);
                return Err(WatchError::ConnectionFailure(e.to_string()));
            }
        };
        set_status(&self.status, shared, ConnectionState::Open);

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (request_tx, request_rx) = unbounded::<Request>();
        let epoch = {
            let mut state = shared.state.lock()?;
            state.epoch += 1;
            let entities = state.collection.list_all();
            let symbols = state.registry.resubscribe_all(&entities);
            info!("Connection open, resubscribing {} symbols", symbols.len());
            for symbol in symbols {
                let _ = request_tx.send(Request::Subscribe(symbol));
            }
            state.requests = Some(request_tx);
            state.epoch
        };

        let dispatcher = {
            let push = Arc::clone(&self.push);
            let stop_rx = stop_rx.clone();
            thread::spawn(move || run_dispatcher(push, request_rx, stop_rx))
        };
        let pump = {
            let shared = Arc::clone(shared);
            let status = Arc::clone(&self.status);
            thread::spawn(move || run_pump(shared, status, epoch, ticks, stop_rx))
        };

        *active = Some(ActiveConnection {
            stop_tx,
            dispatcher,
            pump,
        });
        Ok(())
    }

    /// Closes the connection. The subscription set is cleared without
    /// unsubscribe requests, queued requests are cancelled and the current
    /// snapshot is persisted.
    pub(crate) fn close(&self, shared: &Shared) -> Result<()> {
        let mut active = self.gate.lock()?;
        let previous = self.state();
        if previous == ConnectionState::Closed && active.is_none() {
            return Ok(());
        }
        {
            let mut state = shared.state.lock()?;
            state.epoch += 1;
            state.registry.disconnect();
            state.requests = None;
            state.collection.persist_snapshot();
        }
        if previous != ConnectionState::Closed {
            set_status(&self.status, shared, ConnectionState::Closed);
        }
        if let Some(connection) = active.take() {
            self.teardown(connection);
        }
        info!("Connection closed");
        Ok(())
    }

    /// Stops both threads. The push source is closed before the joins so a
    /// request blocked inside it is cut short.
    fn teardown(&self, connection: ActiveConnection) {
        drop(connection.stop_tx);
        self.push.close();
        if connection.dispatcher.join().is_err() {
            error!("Request dispatcher panicked");
        }
        if connection.pump.join().is_err() {
            error!("Tick pump panicked");
        }
    }
}

fn set_status(status: &Mutex<ConnectionState>, shared: &Shared, next: ConnectionState) {
    *status.lock().unwrap_or_else(PoisonError::into_inner) = next;
    shared.hub.publish(ChangeEvent::Connection(next));
}

fn stopped(stop_rx: &Receiver<()>) -> bool {
    !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
}

fn run_dispatcher(push: Arc<dyn PushSource>, requests: Receiver<Request>, stop_rx: Receiver<()>) {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(requests) -> msg => match msg {
                Ok(request) => {
                    if stopped(&stop_rx) {
                        break;
                    }
                    let result = match &request {
                        Request::Subscribe(symbol) => push.subscribe(symbol),
                        Request::Unsubscribe(symbol) => push.unsubscribe(symbol),
                    };
                    if let Err(e) = result {
                        warn!("Push source rejected {:?}: {}", request, e);
                    }
                }
                Err(_) => break,
            }
        }
    }
    debug!("Request dispatcher stopped");
}

fn run_pump(
    shared: Arc<Shared>,
    status: Arc<Mutex<ConnectionState>>,
    epoch: u64,
    ticks: TickStream,
    stop_rx: Receiver<()>,
) {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticks.receiver()) -> msg => match msg {
                Ok(tick) => shared.deliver(epoch, &tick),
                Err(_) => {
                    connection_lost(&shared, &status, epoch);
                    break;
                }
            }
        }
    }
    debug!("Tick pump stopped");
}

fn connection_lost(shared: &Shared, status: &Mutex<ConnectionState>, epoch: u64) {
    {
        let mut state = shared.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.epoch != epoch {
            return;
        }
        state.epoch += 1;
        state.registry.disconnect();
        state.requests = None;
    }
    warn!("Tick stream ended, connection lost");
    set_status(status, shared, ConnectionState::Closed);
}
