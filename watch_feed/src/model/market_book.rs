//! Prices of every symbol the feed has been asked about.
//!
//! A symbol enters the book on its first subscribe or lookup and is priced
//! from then on. Its open price is fixed at that moment.

use std::collections::HashMap;

use watch_common::tick::Trade;

use crate::model::quote;

/// Open and last price of one symbol.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolPrice {
    pub open: f64,
    pub last: f64,
}

#[derive(Debug, Default)]
pub struct MarketBook {
    prices: HashMap<String, SymbolPrice>,
}

impl MarketBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts pricing `symbol` if needed and returns its prices.
    pub fn track(&mut self, symbol: &str) -> SymbolPrice {
        *self.prices.entry(symbol.to_string()).or_insert_with(|| {
            let open = quote::initial_price();
            SymbolPrice { open, last: open }
        })
    }

    pub fn get(&self, symbol: &str) -> Option<SymbolPrice> {
        self.prices.get(symbol).copied()
    }

    /// Moves every tracked symbol one step and returns the resulting trades.
    pub fn advance(&mut self) -> Vec<Trade> {
        self.prices
            .iter_mut()
            .map(|(symbol, price)| {
                price.last = quote::next_price(price.last);
                quote::trade(symbol, price.last)
            })
            .collect()
    }
}
