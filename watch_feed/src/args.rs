//! Command-line arguments of the feed server.
use clap::Parser;

#[derive(Debug, Parser)]
#[command(version, about = "Synthetic trade feed", long_about = None)]
pub struct Args {
    /// Address to bind the command (TCP) and data (UDP) ports on.
    #[clap(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Milliseconds between two price steps.
    #[clap(long, default_value_t = 500)]
    pub interval_ms: u64,
}
