//! Command-line arguments for the watchlist client.
//!
//! This module defines the CLI interface using `clap`. See `main` for end-to-end usage.
use clap::Parser;

/// Parsed command-line arguments.
#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// IP address of the feed server.
    #[clap(long, default_value = "127.0.0.1")]
    pub server_ip: String,

    /// Local UDP port to receive ticks on; 0 picks a free one.
    #[clap(long, default_value_t = 0)]
    pub listen_port: u16,

    /// Optional symbols file, one `SYMBOL OPEN_PRICE` pair per line.
    #[clap(long)]
    pub path: Option<String>,

    /// JSON file the watchlist is persisted to.
    #[clap(long, default_value = "watchlist.json")]
    pub store: String,
}
