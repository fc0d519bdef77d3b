//! TCP command sessions.
//!
//! Every accepted connection is one client session handled on its own thread.
//! The session reads newline-delimited [`Command`]s: `stream` announces the
//! client's UDP address, `subscribe`/`unsubscribe` edit the session's live
//! symbol set, and lookups are answered with a single [`Reply`] line. A
//! malformed line is logged and skipped; it never ends the session or the
//! server. When the connection ends, the session's stream is closed.

use std::collections::HashSet;
use std::io::{BufRead, BufReader, Write};
use std::net::{IpAddr, SocketAddr, TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use crossbeam_channel::Sender;
use log::{debug, error, info, warn};
use watch_common::command::Command;
use watch_common::{Result, WatchError};

use crate::model::lookup;
use crate::model::market_book::MarketBook;

/// Symbols one client currently streams.
pub type SymbolSet = Arc<Mutex<HashSet<String>>>;

/// Lifecycle of a client's UDP stream, reported to the main loop.
#[derive(Debug)]
pub enum SessionEvent {
    Open { target: SocketAddr, symbols: SymbolSet },
    Closed { target: SocketAddr },
}

pub struct FeedReceiver {
    listener: TcpListener,
}

impl FeedReceiver {
    pub fn new(bind_addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)?;
        Ok(Self { listener })
    }

    /// Accepts connections forever, one session thread each.
    pub fn accept_loop(self, book: Arc<Mutex<MarketBook>>, events: Sender<SessionEvent>) -> Result<()> {
        info!("Command TCP server is started on {}", self.listener.local_addr()?);

        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let book = Arc::clone(&book);
                    let events = events.clone();
                    thread::spawn(move || {
                        let peer = stream.peer_addr().ok();
                        if let Err(e) = run_session(stream, &book, &events) {
                            warn!("Session {:?} ended with error: {}", peer, e);
                        }
                    });
                }
                Err(e) => error!("TCP connection error: {}", e),
            }
        }
        Ok(())
    }
}

struct Session<'a> {
    peer: SocketAddr,
    writer: TcpStream,
    book: &'a Mutex<MarketBook>,
    events: &'a Sender<SessionEvent>,
    symbols: SymbolSet,
    target: Option<SocketAddr>,
}

fn run_session(stream: TcpStream, book: &Mutex<MarketBook>, events: &Sender<SessionEvent>) -> Result<()> {
    let peer = stream.peer_addr()?;
    debug!("Session opened by {}", peer);
    let mut session = Session {
        peer,
        writer: stream.try_clone()?,
        book,
        events,
        symbols: Arc::new(Mutex::new(HashSet::new())),
        target: None,
    };

    let result = session.serve(BufReader::new(stream));
    if let Some(addr) = session.target {
        send(events, SessionEvent::Closed { target: addr })?;
    }
    debug!("Session of {} closed", peer);
    result
}

impl Session<'_> {
    fn serve(&mut self, reader: BufReader<TcpStream>) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match Command::from_line(&line) {
                Ok(command) => self.handle(command)?,
                Err(e) => warn!("Skipping malformed command from {}: {}", self.peer, e),
            }
        }
        Ok(())
    }

    fn handle(&mut self, command: Command) -> Result<()> {
        debug!("Received {:?} from {}", command, self.peer);
        match &command {
            Command::Stream { address, port } => {
                let ip = address.parse::<IpAddr>().unwrap_or(self.peer.ip());
                let addr = SocketAddr::new(ip, *port);
                if let Some(previous) = self.target.replace(addr) {
                    send(self.events, SessionEvent::Closed { target: previous })?;
                }
                send(
                    self.events,
                    SessionEvent::Open {
                        target: addr,
                        symbols: Arc::clone(&self.symbols),
                    },
                )?;
            }
            Command::Subscribe { symbol } => {
                if lookup::is_valid_symbol(symbol) {
                    self.book.lock()?.track(symbol);
                    self.symbols.lock()?.insert(symbol.clone());
                } else {
                    warn!("Ignoring subscribe to invalid symbol {:?}", symbol);
                }
            }
            Command::Unsubscribe { symbol } => {
                self.symbols.lock()?.remove(symbol);
            }
            Command::Profile { .. } | Command::Candles { .. } | Command::News { .. } => {
                if let Some(reply) = lookup::answer(self.book, &command) {
                    self.writer.write_all(reply.to_line()?.as_bytes())?;
                    self.writer.flush()?;
                }
            }
        }
        Ok(())
    }
}

fn send(events: &Sender<SessionEvent>, event: SessionEvent) -> Result<()> {
    events
        .send(event)
        .map_err(|e| WatchError::ChannelSend(e.to_string()))
}
