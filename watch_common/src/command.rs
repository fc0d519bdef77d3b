//! Command protocol spoken on the feed's TCP port.
//!
//! A client keeps one TCP connection open per push-source connection and writes
//! newline-delimited JSON commands tagged by `type`. `stream` registers the
//! client's UDP address, `subscribe`/`unsubscribe` edit the set of symbols
//! streamed to it. Lookup commands (`profile`, `candles`, `news`) are sent on a
//! short-lived connection and answered with a single [`Reply`] line.
use serde::{Deserialize, Serialize};

use crate::Result;
use crate::error::RestFailure;
use crate::market::{Candle, CompanyProfile, NewsItem, TimeRange};

/// Command payload sent from client to feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Command {
    /// Start streaming ticks to `address:port` over UDP.
    Stream {
        /// IP address of the client's UDP socket.
        address: String,
        /// UDP port of the client's socket.
        port: u16,
    },
    /// Add a symbol to the stream.
    Subscribe {
        /// Symbol.
        symbol: String,
    },
    /// Remove a symbol from the stream.
    Unsubscribe {
        /// Symbol.
        symbol: String,
    },
    /// Request a company profile.
    Profile {
        /// Symbol.
        symbol: String,
    },
    /// Request candles inside a window.
    Candles {
        /// Symbol.
        symbol: String,
        /// Window.
        range: TimeRange,
    },
    /// Request news inside a window.
    News {
        /// Symbol.
        symbol: String,
        /// Window.
        range: TimeRange,
    },
}

impl Command {
    /// Creates a `subscribe` command.
    pub fn subscribe(symbol: &str) -> Self {
        Command::Subscribe {
            symbol: symbol.to_string(),
        }
    }

    /// Creates an `unsubscribe` command.
    pub fn unsubscribe(symbol: &str) -> Self {
        Command::Unsubscribe {
            symbol: symbol.to_string(),
        }
    }

    /// Encodes the command as one JSON line, newline included.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decodes one JSON line.
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}

/// Answer to a lookup command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Reply {
    /// Profile lookup result.
    Profile(CompanyProfile),
    /// Candle lookup result.
    Candles(Vec<Candle>),
    /// News lookup result.
    News(Vec<NewsItem>),
    /// The lookup failed.
    Failure(RestFailure),
}

impl Reply {
    /// Encodes the reply as one JSON line, newline included.
    pub fn to_line(&self) -> Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    /// Decodes one JSON line.
    pub fn from_line(line: &str) -> Result<Self> {
        Ok(serde_json::from_str(line.trim())?)
    }
}
