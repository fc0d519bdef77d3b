//! Market data returned by REST-style lookups.
use serde::{Deserialize, Serialize};

/// Company profile with the day's quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    /// Ticker symbol.
    pub symbol: String,
    /// Company name.
    pub name: String,
    /// Trading currency, e.g. `USD`.
    pub currency: String,
    /// Day open price.
    pub open_price: f64,
    /// Latest price known to the source.
    pub current_price: f64,
}

/// One OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time, seconds since Unix epoch.
    pub timestamp: i64,
    /// Open.
    pub open: f64,
    /// High.
    pub high: f64,
    /// Low.
    pub low: f64,
    /// Close.
    pub close: f64,
    /// Volume.
    pub volume: f64,
}

/// A news headline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsItem {
    /// Headline text.
    pub headline: String,
    /// Publisher.
    pub source: String,
    /// Link to the article.
    pub url: String,
    /// Publication time, seconds since Unix epoch.
    pub datetime: i64,
}

/// Inclusive time window, seconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Window start.
    pub from: i64,
    /// Window end.
    pub to: i64,
}

impl TimeRange {
    /// Creates a window.
    pub fn new(from: i64, to: i64) -> Self {
        Self { from, to }
    }

    /// Whether `ts` falls inside the window.
    pub fn contains(&self, ts: i64) -> bool {
        ts >= self.from && ts <= self.to
    }
}
