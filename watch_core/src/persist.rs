//! Best-effort persistence writer.
//!
//! A background thread owns the [`PersistentStore`] and applies queued
//! operations in order. Callers never wait for a write: the in-memory
//! collection is authoritative and a failed write is only logged.
//! [`Persister::flush`] is the one blocking call, a barrier that returns once
//! every earlier operation has been applied.
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, bounded, unbounded};
use log::{debug, error, warn};
use watch_common::{Result, WatchError};

use crate::entity::{EntityId, WatchedEntity};
use crate::source::PersistentStore;

enum PersistOp {
    Put(WatchedEntity),
    Delete(EntityId),
    Flush(Sender<()>),
    Shutdown,
}

/// Cloneable handle that queues operations for the writer thread.
#[derive(Clone)]
pub struct Persister {
    tx: Sender<PersistOp>,
}

impl Persister {
    /// Queues an insert-or-replace.
    pub fn put(&self, entity: WatchedEntity) {
        if self.tx.send(PersistOp::Put(entity)).is_err() {
            warn!("Persistence writer is gone, put dropped");
        }
    }

    /// Queues a delete.
    pub fn delete(&self, id: EntityId) {
        if self.tx.send(PersistOp::Delete(id)).is_err() {
            warn!("Persistence writer is gone, delete of {} dropped", id);
        }
    }

    /// Blocks until every operation queued before this call is applied.
    pub fn flush(&self) -> Result<()> {
        let (done_tx, done_rx) = bounded(1);
        self.tx
            .send(PersistOp::Flush(done_tx))
            .map_err(|e| WatchError::ChannelSend(format!("persistence flush: {e}")))?;
        done_rx
            .recv()
            .map_err(|e| WatchError::ChannelRecv(format!("persistence flush: {e}")))
    }
}

/// Owner of the writer thread. Dropping it drains the queue and joins.
pub struct PersistenceWriter {
    persister: Persister,
    handle: Option<JoinHandle<()>>,
}

impl PersistenceWriter {
    /// Spawns the writer thread over `store`.
    pub fn start(store: Arc<dyn PersistentStore>) -> Self {
        let (tx, rx) = unbounded::<PersistOp>();
        let handle = thread::spawn(move || {
            debug!("Persistence writer started");
            for op in rx.iter() {
                match op {
                    PersistOp::Put(entity) => {
                        if let Err(e) = store.put(&entity) {
                            warn!("Failed to persist {} ({}): {}", entity.symbol, entity.id, e);
                        }
                    }
                    PersistOp::Delete(id) => {
                        if let Err(e) = store.delete(id) {
                            warn!("Failed to delete {} from store: {}", id, e);
                        }
                    }
                    PersistOp::Flush(done) => {
                        let _ = done.send(());
                    }
                    PersistOp::Shutdown => break,
                }
            }
            debug!("Persistence writer stopped");
        });
        Self {
            persister: Persister { tx },
            handle: Some(handle),
        }
    }

    pub fn persister(&self) -> Persister {
        self.persister.clone()
    }
}

impl Drop for PersistenceWriter {
    fn drop(&mut self) {
        let _ = self.persister.tx.send(PersistOp::Shutdown);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Persistence writer panicked");
            }
        }
    }
}
