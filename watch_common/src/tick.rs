//! Price ticks and the feed's datagram format.
//!
//! The feed pushes JSON datagrams shaped like
//! `{"type":"trade","data":[{"s":"AAPL","p":110.5,"t":1700000000000,"v":12.0}]}`.
//! Only the first trade of a message is turned into a [`Tick`]; the trade
//! timestamp becomes the tick's `sequence_hint`. Keep-alive and error messages
//! carry no trades and yield no tick.
use serde::{Deserialize, Serialize};
use strum_macros::Display;

use crate::Result;

/// A single price update for one symbol. Never persisted as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Symbol the price belongs to.
    pub symbol: String,
    /// Last observed price. Not validated: zero and negative values pass through.
    pub price: f64,
    /// Upstream hint only; ordering is never derived from it.
    pub sequence_hint: u64,
}

impl Tick {
    /// Creates a tick.
    pub fn new(symbol: impl Into<String>, price: f64, sequence_hint: u64) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            sequence_hint,
        }
    }
}

/// Kind of feed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageKind {
    /// Carries trades.
    Trade,
    /// Upstream keep-alive.
    Ping,
    /// Upstream error notice.
    Error,
}

/// One trade inside a feed message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Symbol.
    #[serde(rename = "s")]
    pub symbol: String,
    /// Trade price.
    #[serde(rename = "p")]
    pub price: f64,
    /// UTC timestamp in milliseconds since Unix epoch.
    #[serde(rename = "t")]
    pub timestamp: u64,
    /// Traded volume.
    #[serde(rename = "v", default)]
    pub volume: f64,
}

/// A datagram pushed by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedMessage {
    /// Message kind.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Trades, empty unless `kind` is `Trade`.
    #[serde(default)]
    pub data: Vec<Trade>,
}

impl FeedMessage {
    /// Wraps a single trade.
    pub fn trade(trade: Trade) -> Self {
        Self {
            kind: MessageKind::Trade,
            data: vec![trade],
        }
    }

    /// Encode the message to JSON bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a message from JSON bytes.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// The tick carried by this message, if any.
    pub fn first_tick(&self) -> Option<Tick> {
        if self.kind != MessageKind::Trade {
            return None;
        }
        self.data
            .first()
            .map(|trade| Tick::new(trade.symbol.clone(), trade.price, trade.timestamp))
    }
}
