//! Push source backed by the feed server.
//!
//! One [`PushSource::open`] is one feed session:
//! - a TCP connection carrying `stream`, `subscribe` and `unsubscribe` commands,
//! - a UDP socket receiving trade datagrams, turned into ticks by the receiver thread,
//! - a ping thread keeping the feed's stream alive,
//! - a watcher noticing when the feed drops the TCP connection.
//!
//! The tick stream ends when the session is closed or lost.
use std::io::{ErrorKind, Read};
use std::net::{Shutdown, TcpStream, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use log::{debug, error, info, warn};
use watch_common::command::Command;
use watch_common::net::{COMMAND_PORT, DATA_PORT, addr};
use watch_common::tick::FeedMessage;
use watch_common::{Result, Tick, WatchError};
use watch_core::{PushSource, TickStream};

use crate::sender::CommandSender;

/// How often the receiver thread checks for shutdown while idle.
const RECV_POLL: Duration = Duration::from_millis(200);

/// Where the feed server listens.
#[derive(Debug, Clone)]
pub struct FeedAddress {
    pub ip: String,
    pub command_port: u16,
    pub data_port: u16,
}

impl FeedAddress {
    /// Feed on `ip` with the default ports.
    pub fn new(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            command_port: COMMAND_PORT,
            data_port: DATA_PORT,
        }
    }

    pub fn command(&self) -> String {
        addr(&self.ip, self.command_port)
    }

    pub fn data(&self) -> String {
        addr(&self.ip, self.data_port)
    }
}

struct FeedSession {
    commands: TcpStream,
    stop_tx: Sender<()>,
    workers: Vec<JoinHandle<()>>,
}

impl FeedSession {
    fn shutdown(self) {
        drop(self.stop_tx);
        if let Err(e) = self.commands.shutdown(Shutdown::Both) {
            debug!("Command connection already down: {}", e);
        }
        for worker in self.workers {
            if worker.join().is_err() {
                error!("Feed session worker panicked");
            }
        }
    }
}

pub struct FeedPushSource {
    feed: FeedAddress,
    listen_port: u16,
    session: Mutex<Option<FeedSession>>,
}

impl FeedPushSource {
    pub fn new(feed: FeedAddress, listen_port: u16) -> Self {
        Self {
            feed,
            listen_port,
            session: Mutex::new(None),
        }
    }

    fn connect(&self) -> Result<(FeedSession, TickStream)> {
        let commands = TcpStream::connect(self.feed.command())?;
        let socket = Arc::new(UdpSocket::bind(addr("0.0.0.0", self.listen_port))?);
        socket.set_read_timeout(Some(RECV_POLL))?;

        let stream_command = Command::Stream {
            address: commands.local_addr()?.ip().to_string(),
            port: socket.local_addr()?.port(),
        };
        CommandSender::send_command(&commands, &stream_command)?;
        info!(
            "Feed session open: commands {}, ticks on {}",
            self.feed.command(),
            socket.local_addr()?
        );

        let (stop_tx, stop_rx) = bounded::<()>(0);
        let (lost_tx, lost_rx) = bounded::<()>(1);
        let (tick_tx, ticks) = TickStream::channel();

        let watcher = {
            let reader = commands.try_clone()?;
            thread::spawn(move || watch_commands(reader, lost_tx))
        };
        let receiver = {
            let socket = Arc::clone(&socket);
            let stop_rx = stop_rx.clone();
            thread::spawn(move || receive_ticks(&socket, &tick_tx, &stop_rx, &lost_rx))
        };
        let pinger = CommandSender::start_ping_thread(socket, self.feed.data(), stop_rx);

        let session = FeedSession {
            commands,
            stop_tx,
            workers: vec![receiver, pinger, watcher],
        };
        Ok((session, ticks))
    }

    /// Writes `command` on a clone of the session's connection, outside the
    /// session lock, so `close()` can shut the socket under a stalled write.
    fn send(&self, command: &Command) -> Result<()> {
        let commands = {
            let session = self.session.lock()?;
            let session = session
                .as_ref()
                .ok_or_else(|| WatchError::ConnectionFailure("feed session is not open".into()))?;
            session
                .commands
                .try_clone()
                .map_err(|e| WatchError::ConnectionFailure(e.to_string()))?
        };
        CommandSender::send_command(&commands, command)
            .map_err(|e| WatchError::ConnectionFailure(e.to_string()))
    }
}

impl PushSource for FeedPushSource {
    fn open(&self) -> Result<TickStream> {
        let mut session = self.session.lock()?;
        if let Some(previous) = session.take() {
            previous.shutdown();
        }
        let (opened, ticks) = self
            .connect()
            .map_err(|e| WatchError::ConnectionFailure(e.to_string()))?;
        *session = Some(opened);
        Ok(ticks)
    }

    fn subscribe(&self, symbol: &str) -> Result<()> {
        self.send(&Command::subscribe(symbol))
    }

    fn unsubscribe(&self, symbol: &str) -> Result<()> {
        self.send(&Command::unsubscribe(symbol))
    }

    fn close(&self) {
        let session = match self.session.lock() {
            Ok(mut session) => session.take(),
            Err(e) => {
                error!("Feed session lock poisoned: {}", e);
                return;
            }
        };
        if let Some(session) = session {
            session.shutdown();
            info!("Feed session closed");
        }
    }
}

impl Drop for FeedPushSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reads the command connection until the feed closes it.
fn watch_commands(mut reader: TcpStream, lost_tx: Sender<()>) {
    let mut buf = [0u8; 256];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(size) => debug!("Ignoring {} unsolicited bytes from the feed", size),
            Err(ref e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                debug!("Command connection read failed: {}", e);
                break;
            }
        }
    }
    let _ = lost_tx.try_send(());
}

/// Turns trade datagrams into ticks until stopped or the session is lost.
fn receive_ticks(
    socket: &UdpSocket,
    tick_tx: &Sender<Tick>,
    stop_rx: &Receiver<()>,
    lost_rx: &Receiver<()>,
) {
    let mut buf = [0u8; 2048];
    loop {
        if !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty)) {
            break;
        }
        if lost_rx.try_recv().is_ok() {
            warn!("Feed closed the command connection");
            break;
        }
        let size = match socket.recv(&mut buf) {
            Ok(size) => size,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) => {
                error!("Receive data error: {}", e);
                break;
            }
        };
        match FeedMessage::from_json_slice(&buf[..size]) {
            Ok(message) => {
                if let Some(tick) = message.first_tick() {
                    if tick_tx.send(tick).is_err() {
                        break;
                    }
                }
            }
            Err(_) => debug!(
                "Received non-JSON message: {}",
                String::from_utf8_lossy(&buf[..size])
            ),
        }
    }
    debug!("Tick receiver stopping");
}
