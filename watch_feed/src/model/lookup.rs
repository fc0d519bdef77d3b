//! Answers to lookup commands.
//!
//! Profiles come straight from the [`MarketBook`]; looking a symbol up starts
//! pricing it. Candles are synthesised hourly across the requested window and
//! refused with [`RestFailure::Limit`] when the window is too wide. The feed
//! carries no news.

use std::sync::Mutex;

use watch_common::command::{Command, Reply};
use watch_common::market::{Candle, CompanyProfile, TimeRange};
use watch_common::RestFailure;

use crate::model::market_book::MarketBook;
use crate::model::quote;

/// Seconds between two candles.
pub const CANDLE_STEP_SECS: i64 = 3600;
/// Widest candle window answered, in candles.
pub const MAX_CANDLES: i64 = 500;

/// Answers `command`, or `None` when it is not a lookup.
pub fn answer(book: &Mutex<MarketBook>, command: &Command) -> Option<Reply> {
    let result = match command {
        Command::Profile { symbol } => profile(book, symbol).map(Reply::Profile),
        Command::Candles { symbol, range } => candles(book, symbol, *range).map(Reply::Candles),
        Command::News { .. } => Err(RestFailure::Unsupported),
        Command::Stream { .. } | Command::Subscribe { .. } | Command::Unsubscribe { .. } => {
            return None;
        }
    };
    Some(result.unwrap_or_else(Reply::Failure))
}

/// Symbols are 1 to 12 characters of letters, digits, `.` or `-`.
pub fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= 12
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

fn profile(book: &Mutex<MarketBook>, symbol: &str) -> Result<CompanyProfile, RestFailure> {
    if !is_valid_symbol(symbol) {
        return Err(RestFailure::NotFound(symbol.to_string()));
    }
    let price = book
        .lock()
        .map_err(|e| RestFailure::Network(e.to_string()))?
        .track(symbol);
    Ok(CompanyProfile {
        symbol: symbol.to_string(),
        name: format!("{symbol} Corp."),
        currency: "USD".into(),
        open_price: price.open,
        current_price: price.last,
    })
}

fn candles(
    book: &Mutex<MarketBook>,
    symbol: &str,
    range: TimeRange,
) -> Result<Vec<Candle>, RestFailure> {
    if range.from > range.to {
        return Err(RestFailure::Malformed(format!(
            "window starts after it ends: {}..{}",
            range.from, range.to
        )));
    }
    // A span too wide for i64 is past the limit as well.
    match range.to.checked_sub(range.from) {
        Some(span) if span / CANDLE_STEP_SECS < MAX_CANDLES => {}
        _ => return Err(RestFailure::Limit),
    }
    let mut close = profile(book, symbol)?.open_price;

    let mut candles = Vec::new();
    let mut timestamp = range.from;
    while timestamp <= range.to {
        let open = close;
        close = quote::next_price(open);
        let swing = quote::next_price(open.max(close)).max(open.max(close));
        candles.push(Candle {
            timestamp,
            open,
            high: swing,
            low: open.min(close) * 0.995,
            close,
            volume: quote::trade(symbol, close).volume,
        });
        timestamp = match timestamp.checked_add(CANDLE_STEP_SECS) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(candles)
}
