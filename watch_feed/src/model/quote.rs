//! Synthetic pricing.
//!
//! Prices follow a small random walk: every step moves the last price by at
//! most one percent in either direction. Trades carry a millisecond UTC
//! timestamp and a synthetic volume.

use chrono::Utc;
use rand::Rng;
use watch_common::tick::Trade;

/// Lowest price the walk can reach.
pub const MIN_PRICE: f64 = 0.01;

/// Next price of a random walk starting at `current_price`.
pub fn next_price(current_price: f64) -> f64 {
    let mut rng = rand::rng();
    let change: f64 = rng.random_range(-0.01..0.01);
    (current_price * (1.0 + change)).max(MIN_PRICE)
}

/// Opening price for a symbol seen for the first time.
pub fn initial_price() -> f64 {
    let mut rng = rand::rng();
    let cents: u32 = rng.random_range(2_000..50_000);
    f64::from(cents) / 100.0
}

/// A trade of `symbol` at `price`, stamped now.
pub fn trade(symbol: &str, price: f64) -> Trade {
    let mut rng = rand::rng();
    Trade {
        symbol: symbol.to_string(),
        price,
        timestamp: Utc::now().timestamp_millis().max(0) as u64,
        volume: f64::from(rng.random_range(1u32..5_000)),
    }
}
