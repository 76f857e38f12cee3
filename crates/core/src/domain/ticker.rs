use anyhow::ensure;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const MAX_TICKER_LEN: usize = 20;

/// The fixed watchlist the report always covers.
pub const WATCHLIST: [&str; 3] = ["AAPL", "GOOGL", "MSFT"];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let symbol = raw.trim().to_ascii_uppercase();
        ensure!(!symbol.is_empty(), "ticker must be non-empty");
        ensure!(
            symbol.len() <= MAX_TICKER_LEN,
            "ticker must be at most {MAX_TICKER_LEN} characters (got {})",
            symbol.len()
        );
        ensure!(
            symbol
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=')),
            "ticker contains invalid characters: {raw}"
        );
        Ok(Self(symbol))
    }

    pub fn watchlist() -> Vec<Ticker> {
        WATCHLIST.iter().map(|s| Ticker(s.to_string())).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_in_watchlist(&self) -> bool {
        WATCHLIST.contains(&self.0.as_str())
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ticker::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Ticker::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}
