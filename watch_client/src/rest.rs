//! Lookups answered by the feed server.
//!
//! Each lookup opens a short-lived TCP connection to the command port, writes
//! one command line and reads one [`Reply`] line back.
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::time::Duration;

use log::debug;
use watch_common::command::{Command, Reply};
use watch_common::market::{Candle, CompanyProfile, NewsItem, TimeRange};
use watch_common::RestFailure;
use watch_core::RestSource;

use crate::feed::FeedAddress;

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct FeedRestSource {
    feed: FeedAddress,
}

impl FeedRestSource {
    pub fn new(feed: FeedAddress) -> Self {
        Self { feed }
    }

    fn request(&self, command: &Command) -> Result<Reply, RestFailure> {
        let network = |e: std::io::Error| RestFailure::Network(e.to_string());

        let mut stream = TcpStream::connect(self.feed.command()).map_err(network)?;
        stream.set_read_timeout(Some(REPLY_TIMEOUT)).map_err(network)?;
        let line = command
            .to_line()
            .map_err(|e| RestFailure::Malformed(e.to_string()))?;
        stream.write_all(line.as_bytes()).map_err(network)?;

        let mut reply = String::new();
        BufReader::new(stream).read_line(&mut reply).map_err(network)?;
        if reply.is_empty() {
            return Err(RestFailure::Network("feed closed without replying".into()));
        }
        debug!("Lookup {:?} answered: {}", command, reply.trim());
        match Reply::from_line(&reply).map_err(|e| RestFailure::Malformed(e.to_string()))? {
            Reply::Failure(failure) => Err(failure),
            reply => Ok(reply),
        }
    }
}

fn unexpected(reply: Reply) -> RestFailure {
    RestFailure::Malformed(format!("unexpected reply: {reply:?}"))
}

impl RestSource for FeedRestSource {
    fn fetch_profile(&self, symbol: &str) -> Result<CompanyProfile, RestFailure> {
        match self.request(&Command::Profile {
            symbol: symbol.to_string(),
        })? {
            Reply::Profile(profile) => Ok(profile),
            other => Err(unexpected(other)),
        }
    }

    fn fetch_candles(&self, symbol: &str, range: TimeRange) -> Result<Vec<Candle>, RestFailure> {
        match self.request(&Command::Candles {
            symbol: symbol.to_string(),
            range,
        })? {
            Reply::Candles(candles) => Ok(candles),
            other => Err(unexpected(other)),
        }
    }

    fn fetch_news(&self, symbol: &str, range: TimeRange) -> Result<Vec<NewsItem>, RestFailure> {
        match self.request(&Command::News {
            symbol: symbol.to_string(),
            range,
        })? {
            Reply::News(news) => Ok(news),
            other => Err(unexpected(other)),
        }
    }
}
