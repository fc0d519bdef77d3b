//! Domain models of the feed server.
//!
//! - `market_book`: open and last price of every symbol the feed prices.
//! - `quote`: random-walk pricing and trade synthesis.
//! - `quote_generator`: background ticker broadcasting trades to client streams.
//! - `lookup`: answers to profile, candle and news requests.
//! - `ping_monitor`: keep-alive tracker for client streams.

pub mod lookup;
pub mod market_book;
pub mod ping_monitor;
pub mod quote;
pub mod quote_generator;
