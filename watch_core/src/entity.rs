//! The watched entity owned by the cached collection.
use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier of a watched entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A company the user tracks with live updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchedEntity {
    pub id: EntityId,
    pub symbol: String,
    /// Higher means more recently added; iteration is descending.
    pub display_order: i64,
    pub last_known_price: f64,
    pub open_price_at_subscribe: f64,
}

impl WatchedEntity {
    /// Fractional change of `price` against the open price, `0.0` when the
    /// open price is zero.
    pub fn profit_percent(&self, price: f64) -> f64 {
        profit_percent(price, self.open_price_at_subscribe)
    }
}

pub(crate) fn profit_percent(price: f64, open: f64) -> f64 {
    if open == 0.0 {
        return 0.0;
    }
    (price - open) / open
}
