//! Keep-alive tracker for client streams.
//!
//! Remembers when each client UDP address last pinged. A stream is registered
//! when it starts, so a client that never pings still times out.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub struct PingMonitor {
    last_seen: HashMap<SocketAddr, Instant>,
    timeout: Duration,
}

impl PingMonitor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            last_seen: HashMap::new(),
            timeout,
        }
    }

    /// Records a ping (or a fresh stream) from `addr` at `now`.
    pub fn touch(&mut self, addr: SocketAddr, now: Instant) {
        self.last_seen.insert(addr, now);
    }

    /// Stops tracking `addr`.
    pub fn forget(&mut self, addr: &SocketAddr) {
        self.last_seen.remove(addr);
    }

    /// Removes and returns every client silent for longer than the timeout.
    pub fn expire(&mut self, now: Instant) -> Vec<SocketAddr> {
        let timeout = self.timeout;
        let mut expired = Vec::new();
        self.last_seen.retain(|addr, last| {
            let alive = now.saturating_duration_since(*last) <= timeout;
            if !alive {
                expired.push(*addr);
            }
            alive
        });
        expired
    }
}
