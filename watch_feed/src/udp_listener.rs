use std::net::UdpSocket;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Instant;

use log::{debug, error};
use watch_common::net::PING;

use crate::model::ping_monitor::PingMonitor;

/// Receives `PING` datagrams and refreshes the sender in the [`PingMonitor`].
pub struct UdpPingListener;

impl UdpPingListener {
    pub fn start(socket: Arc<UdpSocket>, ping_monitor: Arc<Mutex<PingMonitor>>) {
        thread::spawn(move || {
            let mut buf = [0u8; 128];
            loop {
                let (size, addr) = match socket.recv_from(&mut buf) {
                    Ok(received) => received,
                    Err(e) => {
                        debug!("UDP receive failed: {}", e);
                        continue;
                    }
                };
                if !buf[..size].starts_with(PING) {
                    debug!("Ignoring {} byte datagram from {}", size, addr);
                    continue;
                }
                debug!("Received ping from {}", addr);
                match ping_monitor.lock() {
                    Ok(mut monitor) => monitor.touch(addr, Instant::now()),
                    Err(e) => {
                        error!("Ping monitor poisoned: {}", e);
                        break;
                    }
                }
            }
        });
    }
}
