//! Watchlist client. Keeps a persisted list of watched companies live against
//! the feed server and logs every change until Ctrl+C.
//!
//! Usage example (CLI):
//! ```bash
//! watch_client --server-ip 192.168.0.10 --path ./symbols.txt --store ./watchlist.json
//! ```
//!
//! The symbols file holds one `SYMBOL OPEN_PRICE` pair per line, `#` starts a
//! comment. Symbols already in the store are kept; new ones are added on top
//! until the subscription cap is reached.
mod args;
mod feed;
mod rest;
mod sender;

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use crossbeam_channel::{bounded, select};
use log::{error, info, warn};
use watch_common::net::DATA_PORT;
use watch_common::symbols::{SymbolParser, WatchSeed};
use watch_common::{Result, WatchError};
use watch_core::{
    ChangeEvent, ConnectionState, JsonFileStore, WatchConfig, WatchContext, Watchlist,
    profit_label,
};

use crate::args::Args;
use crate::feed::{FeedAddress, FeedPushSource};
use crate::rest::FeedRestSource;

fn main() -> Result<()> {
    init_logger();
    let args = Args::parse();

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        info!("Ctrl+C received. Shutting down client...");
        let _ = shutdown_tx.try_send(());
    })
    .map_err(|e| WatchError::Format(format!("Error setting Ctrl+C handler: {e}")))?;

    let mut listen_port = args.listen_port;
    if listen_port == DATA_PORT {
        warn!(
            "--listen-port={} matches the feed's DATA_PORT. A free local port will be selected.",
            listen_port
        );
        listen_port = 0;
    }

    let feed = FeedAddress::new(args.server_ip.trim().replace('"', ""));
    let watchlist = Watchlist::new(WatchContext {
        store: Arc::new(JsonFileStore::new(normalize_path(&args.store))),
        push: Arc::new(FeedPushSource::new(feed.clone(), listen_port)),
        rest: Arc::new(FeedRestSource::new(feed)),
        config: WatchConfig::default(),
    });

    watchlist.restore()?;
    if let Some(path) = &args.path {
        add_seeds(&watchlist, &normalize_path(path))?;
    }

    let changes = watchlist.subscribe();
    watchlist.open()?;
    for entity in watchlist.list_all() {
        info!(
            "Watching {} {} opened at {:.2}",
            entity.id, entity.symbol, entity.open_price_at_subscribe
        );
    }
    info!("Client is running. Press Ctrl+C to exit.");

    loop {
        select! {
            recv(shutdown_rx) -> _ => break,
            recv(changes.receiver()) -> msg => match msg {
                Ok(event) => report(&watchlist, event),
                Err(_) => break,
            },
        }
    }

    watchlist.close()?;
    watchlist.flush()?;
    Ok(())
}

fn add_seeds(watchlist: &Watchlist, path: &Path) -> Result<()> {
    if !is_file_exist(path) {
        warn!("Symbols file {} not found", path.display());
        return Ok(());
    }
    let seeds = WatchSeed::parse_from_file(BufReader::new(File::open(path)?))?;
    for seed in seeds {
        match watchlist.add(&seed.symbol, seed.open_price) {
            Ok(entity) => info!("Added {} as {}", entity.symbol, entity.id),
            Err(WatchError::CapExceeded { limit }) => {
                warn!("Skipping {}: already watching {} symbols", seed.symbol, limit);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn report(watchlist: &Watchlist, event: ChangeEvent) {
    match event {
        ChangeEvent::PriceUpdated {
            entity_id,
            new_price,
            profit_percent,
        } => {
            let symbol = watchlist
                .get(entity_id)
                .map(|entity| entity.symbol)
                .unwrap_or_else(|| entity_id.to_string());
            info!("{} {:.2} {}", symbol, new_price, profit_label(profit_percent));
        }
        ChangeEvent::Added(entity) => info!("{} added", entity.symbol),
        ChangeEvent::Removed(entity) => info!("{} removed", entity.symbol),
        ChangeEvent::Connection(state) => {
            if state == ConnectionState::Closed {
                error!("Feed connection closed");
            } else {
                info!("Feed connection {}", state);
            }
        }
    }
}

fn init_logger() {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

/// Normalize a CLI-provided path string by trimming whitespace and matching quotes.
fn normalize_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let no_quotes = trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed);
    PathBuf::from(no_quotes)
}

fn is_file_exist(path: &Path) -> bool {
    path.exists() && path.is_file()
}
