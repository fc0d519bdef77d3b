//! Change notifications for observers.
//!
//! [`ChangeHub::publish`] never blocks. Each observer owns a bounded buffer;
//! when an observer falls behind, the oldest buffered event is dropped to make
//! room. A later price for an entity supersedes an earlier one, so observers
//! lose nothing they need. Observers that dropped their [`ChangeStream`] are
//! pruned on the next publish.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};

use crate::connection::ConnectionState;
use crate::entity::{EntityId, WatchedEntity};

/// A change to the watchlist.
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A tick was applied.
    PriceUpdated {
        entity_id: EntityId,
        new_price: f64,
        profit_percent: f64,
    },
    /// An entity was added in front of the collection.
    Added(WatchedEntity),
    /// An entity was removed.
    Removed(WatchedEntity),
    /// The push-source connection changed state.
    Connection(ConnectionState),
}

struct Subscriber {
    tx: Sender<ChangeEvent>,
    // Lets the producer evict the oldest event without blocking.
    evict: Receiver<ChangeEvent>,
    alive: Arc<AtomicBool>,
}

pub struct ChangeHub {
    subscribers: Mutex<Vec<Subscriber>>,
    buffer: usize,
}

impl ChangeHub {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            buffer: buffer.max(1),
        }
    }

    /// Registers a new observer. It sees events published from now on.
    pub fn subscribe(&self) -> ChangeStream {
        let (tx, rx) = bounded(self.buffer);
        let alive = Arc::new(AtomicBool::new(true));
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscriber {
                tx,
                evict: rx.clone(),
                alive: Arc::clone(&alive),
            });
        ChangeStream { rx, alive }
    }

    /// Delivers `event` to every live observer without blocking.
    pub fn publish(&self, event: ChangeEvent) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sub| sub.alive.load(Ordering::Acquire));
        for sub in subscribers.iter() {
            let mut pending = event.clone();
            loop {
                match sub.tx.try_send(pending) {
                    Ok(()) => break,
                    Err(TrySendError::Full(back)) => {
                        let _ = sub.evict.try_recv();
                        pending = back;
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
        }
    }

    pub fn observer_count(&self) -> usize {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|sub| sub.alive.load(Ordering::Acquire));
        subscribers.len()
    }
}

/// An observer's view of the change stream.
pub struct ChangeStream {
    rx: Receiver<ChangeEvent>,
    alive: Arc<AtomicBool>,
}

impl ChangeStream {
    /// Next event, if one is buffered.
    pub fn try_recv(&self) -> Option<ChangeEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for the next event.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        match self.rx.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything buffered right now.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.rx.try_iter().collect()
    }

    /// Underlying receiver, for use in `select!`.
    pub fn receiver(&self) -> &Receiver<ChangeEvent> {
        &self.rx
    }
}

impl Drop for ChangeStream {
    fn drop(&mut self) {
        self.alive.store(false, Ordering::Release);
    }
}
