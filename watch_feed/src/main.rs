//! Synthetic trade feed.
//!
//! Serves the push and lookup side of the live watchlist over the network:
//!
//! - `FeedReceiver` accepts TCP command sessions. A session announces its UDP
//!   address with `stream`, edits its symbol set with `subscribe` and
//!   `unsubscribe`, and gets profile/candle/news lookups answered inline.
//! - `QuoteGenerator` random-walks every symbol in the shared `MarketBook`
//!   and broadcasts the trades to all client streams.
//! - Per-client stream thread: filters trades by the session's live symbol
//!   set and sends them as `{"type":"trade","data":[..]}` datagrams.
//! - `UdpPingListener` and the ping checker close streams whose client
//!   stopped sending `PING` keep-alives.
//!
//! Ports: commands on `COMMAND_PORT` (TCP), data and pings on `DATA_PORT` (UDP).
mod args;
mod model;
mod receiver;
mod udp_listener;

use std::collections::HashMap;
use std::net::{SocketAddr, UdpSocket};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use log::{debug, error, info, warn};
use watch_common::net::{COMMAND_PORT, DATA_PORT, PING_TIMEOUT_SECS, addr};
use watch_common::tick::FeedMessage;
use watch_common::Result;

use crate::args::Args;
use crate::model::market_book::MarketBook;
use crate::model::ping_monitor::PingMonitor;
use crate::model::quote_generator::{QuoteEvent, QuoteGenerator};
use crate::receiver::{FeedReceiver, SessionEvent, SymbolSet};
use crate::udp_listener::UdpPingListener;

/// Stream task for a single client.
///
/// Forwards every trade whose symbol is in `symbols` to `target`. Ends when
/// `stop_rx` disconnects, the generator shuts down, or a send fails.
fn handle_client_stream(
    socket: Arc<UdpSocket>,
    target: SocketAddr,
    symbols: SymbolSet,
    data_rx: Receiver<QuoteEvent>,
    stop_rx: Receiver<()>,
) -> Result<()> {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(data_rx) -> msg => match msg {
                Ok(QuoteEvent::Trade(trade)) => {
                    if !symbols.lock()?.contains(&trade.symbol) {
                        continue;
                    }
                    let data = FeedMessage::trade(trade).to_json_bytes()?;
                    socket.send_to(&data, target)?;
                }
                Ok(QuoteEvent::Shutdown) | Err(_) => break,
            }
        }
    }
    debug!("Stream to {} finished", target);
    Ok(())
}

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let udp_socket = Arc::new(UdpSocket::bind(addr(&args.bind, DATA_PORT))?);
    info!("UDP socket created on: {}", udp_socket.local_addr()?);

    let ping_monitor = Arc::new(Mutex::new(PingMonitor::new(Duration::from_secs(
        PING_TIMEOUT_SECS,
    ))));
    UdpPingListener::start(Arc::clone(&udp_socket), Arc::clone(&ping_monitor));
    let (timeout_tx, timeout_rx) = unbounded::<SocketAddr>();
    start_ping_checker(Arc::clone(&ping_monitor), timeout_tx);

    let book = Arc::new(Mutex::new(MarketBook::new()));
    let register_tx = QuoteGenerator::start(Arc::clone(&book), Duration::from_millis(args.interval_ms));

    let (session_tx, session_rx) = unbounded::<SessionEvent>();
    let receiver = FeedReceiver::new(&addr(&args.bind, COMMAND_PORT))?;
    thread::spawn(move || {
        if let Err(e) = receiver.accept_loop(book, session_tx) {
            error!("Receiver loop failed: {}", e);
        }
    });

    let mut active_streams: HashMap<SocketAddr, Sender<()>> = HashMap::new();
    loop {
        select! {
            recv(session_rx) -> msg => match msg {
                Ok(SessionEvent::Open { target, symbols }) => {
                    let (stop_tx, stop_rx) = bounded::<()>(0);
                    let (data_tx, data_rx) = unbounded::<QuoteEvent>();
                    if let Err(e) = register_tx.send(data_tx) {
                        error!("Failed to register stream for {}: {}", target, e);
                        continue;
                    }
                    if active_streams.insert(target, stop_tx).is_some() {
                        info!("Replacing stream for {}", target);
                    }
                    ping_monitor.lock()?.touch(target, Instant::now());

                    let socket = Arc::clone(&udp_socket);
                    thread::spawn(move || {
                        if let Err(e) = handle_client_stream(socket, target, symbols, data_rx, stop_rx) {
                            error!("Stream to {} failed: {}", target, e);
                        }
                    });
                    info!("Streaming to {}", target);
                }
                Ok(SessionEvent::Closed { target }) => {
                    if active_streams.remove(&target).is_some() {
                        ping_monitor.lock()?.forget(&target);
                        info!("Stream for {} closed: session ended", target);
                    }
                }
                Err(_) => break,
            },
            recv(timeout_rx) -> msg => if let Ok(client) = msg {
                if active_streams.remove(&client).is_some() {
                    info!("Stream for {} closed: ping timeout", client);
                } else {
                    warn!("Ping timeout for {} without a stream", client);
                }
            },
        }
    }
    Ok(())
}

fn start_ping_checker(ping_monitor: Arc<Mutex<PingMonitor>>, timeout_tx: Sender<SocketAddr>) {
    thread::spawn(move || {
        let check_interval = Duration::from_secs(1);
        loop {
            thread::sleep(check_interval);
            let expired = match ping_monitor.lock() {
                Ok(mut monitor) => monitor.expire(Instant::now()),
                Err(e) => {
                    error!("Ping monitor poisoned: {}", e);
                    return;
                }
            };
            for client in expired {
                if timeout_tx.send(client).is_err() {
                    return;
                }
            }
        }
    });
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}
