//! Market data domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Candle interval for a price inquiry.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandleInterval {
    /// One-minute candles.
    Minute1,
    /// Five-minute candles.
    Minute5,
    /// Fifteen-minute candles.
    Minute15,
    /// Hourly candles.
    Hour1,
    /// Daily candles.
    Day,
    /// Weekly candles.
    Week,
    /// Monthly candles.
    Month,
}

impl CandleInterval {
    /// Provider wire code for this interval.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Minute1 => "M1",
            Self::Minute5 => "M5",
            Self::Minute15 => "M15",
            Self::Hour1 => "H1",
            Self::Day => "D",
            Self::Week => "W",
            Self::Month => "M",
        }
    }

    /// Parse an interval from its wire code (case-insensitive).
    pub fn from_code(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "M1" => Some(Self::Minute1),
            "M5" => Some(Self::Minute5),
            "M15" => Some(Self::Minute15),
            "H1" => Some(Self::Hour1),
            "D" => Some(Self::Day),
            "W" => Some(Self::Week),
            "M" => Some(Self::Month),
            _ => None,
        }
    }
}

impl std::fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Minute1 => "1m",
            Self::Minute5 => "5m",
            Self::Minute15 => "15m",
            Self::Hour1 => "1h",
            Self::Day => "1d",
            Self::Week => "1w",
            Self::Month => "1mo",
        };
        write!(f, "{}", label)
    }
}

/// A parsed stock quote from the brokerage provider.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StockQuote {
    /// Six-digit stock code.
    pub symbol: String,

    /// Issuer name, when the provider supplies one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Current/last traded price.
    pub current_price: Decimal,

    /// Change versus the previous close.
    pub change: Decimal,

    /// Change rate in percent.
    pub change_rate: Decimal,

    /// Opening price.
    pub open: Decimal,

    /// Session high.
    pub high: Decimal,

    /// Session low.
    pub low: Decimal,

    /// Previous close.
    pub previous_close: Decimal,

    /// Accumulated volume.
    pub volume: Decimal,

    /// Interval the quote was requested for.
    pub interval: CandleInterval,

    /// When the quote was fetched.
    pub timestamp: DateTime<Utc>,
}
