//! Trade generator and event broadcasting.
//!
//! `QuoteGenerator` runs a background thread that advances the shared
//! [`MarketBook`] at a fixed interval and broadcasts every resulting trade to
//! all registered client streams. Streams register by sending a
//! `Sender<QuoteEvent>` to the channel returned by [`QuoteGenerator::start`];
//! a stream whose channel is gone is dropped on the next broadcast.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Sender, unbounded};
use log::{debug, error, info};
use watch_common::tick::Trade;

use crate::model::market_book::MarketBook;

/// Message sent by the generator to client streams.
#[derive(Debug, Clone)]
pub enum QuoteEvent {
    Trade(Trade),
    Shutdown,
}

pub struct QuoteGenerator;

impl QuoteGenerator {
    /// Starts the generator thread and returns the registration channel.
    pub fn start(book: Arc<Mutex<MarketBook>>, interval: Duration) -> Sender<Sender<QuoteEvent>> {
        let (register_tx, register_rx) = unbounded::<Sender<QuoteEvent>>();

        thread::spawn(move || {
            let mut clients: Vec<Sender<QuoteEvent>> = Vec::new();
            info!("Quote generator started, interval {:?}", interval);

            loop {
                while let Ok(client_tx) = register_rx.try_recv() {
                    clients.push(client_tx);
                    debug!("Generator: client registered, {} total", clients.len());
                }

                let trades = match book.lock() {
                    Ok(mut book) => book.advance(),
                    Err(e) => {
                        error!("Market book poisoned: {}", e);
                        break;
                    }
                };
                for trade in trades {
                    let event = QuoteEvent::Trade(trade);
                    clients.retain(|client_tx| client_tx.send(event.clone()).is_ok());
                }

                thread::sleep(interval);
            }

            for client_tx in clients {
                let _ = client_tx.send(QuoteEvent::Shutdown);
            }
        });
        register_tx
    }
}
