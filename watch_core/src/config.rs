//! Tunables of the live watchlist.

/// Upper bound on symbols subscribed live at the push source. Imposed by the
/// upstream feed: beyond it some or all symbols stop receiving updates.
pub const MAX_SUBSCRIPTIONS: usize = 50;

/// Events buffered per observer before the oldest ones are dropped.
pub const DEFAULT_OBSERVER_BUFFER: usize = 64;

/// Watchlist configuration.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Subscription cap enforced on user adds.
    pub max_subscriptions: usize,
    /// Per-observer change buffer.
    pub observer_buffer: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            max_subscriptions: MAX_SUBSCRIPTIONS,
            observer_buffer: DEFAULT_OBSERVER_BUFFER,
        }
    }
}
