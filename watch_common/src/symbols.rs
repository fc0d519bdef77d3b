//! Symbol seeds read from the client's symbols file.
//!
//! Each non-empty line holds a symbol and the open price recorded when it is
//! first watched, separated by whitespace or a comma: `AAPL 100.0` or
//! `MSFT,312.5`. Lines starting with `#` are comments. Symbols are normalised
//! to upper case.
use std::io::BufRead;

use crate::error::WatchError;

/// Trait providing file parsing for watch seeds.
pub trait SymbolParser: Sized {
    /// Parses seeds from a buffered reader, one per non-empty line.
    ///
    /// Returns an error naming the first line that cannot be parsed.
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, WatchError>;
}

/// A symbol to watch together with its open price.
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSeed {
    /// Upper-case symbol.
    pub symbol: String,
    /// Open price at subscribe time.
    pub open_price: f64,
}

impl std::str::FromStr for WatchSeed {
    type Err = WatchError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|part| !part.is_empty());
        let symbol = parts
            .next()
            .ok_or_else(|| WatchError::ParseSymbolsFile(format!("empty line: {line}")))?;
        let open_price = parts
            .next()
            .ok_or_else(|| WatchError::ParseSymbolsFile(format!("missing open price: {line}")))?
            .parse::<f64>()
            .map_err(|e| WatchError::ParseSymbolsFile(format!("{line}: {e}")))?;
        if parts.next().is_some() {
            return Err(WatchError::ParseSymbolsFile(format!("trailing data: {line}")));
        }
        Ok(WatchSeed {
            symbol: symbol.to_ascii_uppercase(),
            open_price,
        })
    }
}

impl SymbolParser for WatchSeed {
    fn parse_from_file<R: BufRead>(reader: R) -> Result<Vec<Self>, WatchError> {
        let mut seeds = Vec::new();

        for line_result in reader.lines() {
            let line = line_result.map_err(WatchError::Io)?;
            let trimmed_line = line.trim();
            if trimmed_line.is_empty() || trimmed_line.starts_with('#') {
                continue;
            }
            seeds.push(trimmed_line.parse::<Self>()?);
        }
        Ok(seeds)
    }
}
