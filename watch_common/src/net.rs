//! Shared networking constants and helpers used by the feed and the client.

/// TCP port for the command channel (client -> feed).
pub const COMMAND_PORT: u16 = 8080;
/// UDP port for tick streaming and pings (feed <-> client).
pub const DATA_PORT: u16 = 8081;
/// Interval between client keep-alive pings.
pub const PING_INTERVAL_MS: u64 = 2000;
/// A stream whose client has not pinged for this long is closed by the feed.
pub const PING_TIMEOUT_SECS: u64 = 5;
/// Keep-alive datagram payload.
pub const PING: &[u8] = b"PING";

/// Helper to format an IPv4 address with a port like "ip:port".
pub fn addr(ip: &str, port: u16) -> String {
    format!("{}:{}", ip, port)
}
