use std::fmt;
use std::str::FromStr;

use chrono::Local;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Provider data feed to query. `Iex` is the free consolidated feed; the
/// others are premium tiers and may be rejected by the provider with an
/// authorization error if the account lacks the entitlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Feed {
    Iex,
    Sip,
    Boats,
}

impl Feed {
    /// Wire value for the provider's `feed` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Feed::Iex => "iex",
            Feed::Sip => "sip",
            Feed::Boats => "boats",
        }
    }
}

impl fmt::Display for Feed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown feed '{0}', expected one of: iex, sip, boats")]
pub struct UnknownFeed(String);

impl FromStr for Feed {
    type Err = UnknownFeed;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iex" => Ok(Feed::Iex),
            "sip" => Ok(Feed::Sip),
            "boats" => Ok(Feed::Boats),
            _ => Err(UnknownFeed(s.to_string())),
        }
    }
}

/// Latest trade for one symbol, as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub price: f64,
    pub size: f64,
    pub timestamp: String,
    pub exchange: String,
}

/// Latest quote for one symbol, as reported by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub bid_price: f64,
    pub ask_price: f64,
    pub bid_size: f64,
    pub ask_size: f64,
    pub timestamp: String,
}

impl Quote {
    pub fn spread(&self) -> f64 {
        self.ask_price - self.bid_price
    }
}

/// The published price bundle. The serialized field names are the contract
/// with the downstream RTD display and must not change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(rename = "BidPrice")]
    pub bid_price: f64,
    #[serde(rename = "AskPrice")]
    pub ask_price: f64,
    #[serde(rename = "LastPrice")]
    pub last_price: f64,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "UpdateTime")]
    pub update_time: String,
}

impl Snapshot {
    /// Assemble a fresh snapshot from a trade/quote pair. Prices are passed
    /// through as reported, the quote timestamp wins over the trade's, and
    /// `update_time` is stamped with the local wall clock.
    pub fn assemble(trade: &Trade, quote: &Quote) -> Self {
        Self {
            bid_price: quote.bid_price,
            ask_price: quote.ask_price,
            last_price: trade.price,
            timestamp: quote.timestamp.clone(),
            update_time: Local::now().to_rfc3339(),
        }
    }
}
