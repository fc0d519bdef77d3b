//! Command and keep-alive traffic towards the feed.
//!
//! Commands are written as JSON lines on the session's TCP connection. The
//! ping thread sends `PING` from the tick socket so the feed can tie the
//! keep-alive to the stream it serves.
use std::io::{ErrorKind, Write};
use std::net::{TcpStream, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, select};
use log::{debug, error, info};
use watch_common::command::Command;
use watch_common::net::{PING, PING_INTERVAL_MS};
use watch_common::Result;

/// Helper type for sending commands to the feed.
pub struct CommandSender;

impl CommandSender {
    pub fn send_command(mut stream: &TcpStream, command: &Command) -> Result<()> {
        debug!("Sending command: {:?}", command);
        stream.write_all(command.to_line()?.as_bytes())?;
        stream.flush()?;
        Ok(())
    }

    /// Pings `target` every `PING_INTERVAL_MS` until `stop_rx` disconnects.
    pub fn start_ping_thread(
        socket: Arc<UdpSocket>,
        target: String,
        stop_rx: Receiver<()>,
    ) -> JoinHandle<()> {
        info!("Ping thread started. Target: {}", target);
        thread::spawn(move || {
            let interval = Duration::from_millis(PING_INTERVAL_MS);
            loop {
                select! {
                    recv(stop_rx) -> _ => break,
                    default(interval) => match socket.send_to(PING, &target) {
                        Ok(_) => debug!("PING sent to {}", target),
                        Err(ref e) if e.kind() == ErrorKind::ConnectionReset => {}
                        Err(e) => error!("Failed to send PING: {}", e),
                    },
                }
            }
            debug!("Ping thread stopping");
        })
    }
}
