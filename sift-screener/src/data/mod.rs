//! Market data layer.
//!
//! Core types for exchange market data, the provider abstraction, the OKX
//! REST adapter, and the shared request throttle.

mod okx;
mod provider;
mod rate_limiter;

pub use okx::OkxProvider;
pub use provider::{MarketDataProvider, ProviderError};
pub use rate_limiter::{shared_limiter, RateLimiter, SharedRateLimiter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Timeframe
// ============================================================================

/// Candle interval, named with the exchange's bar strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1H")]
    H1,
    #[serde(rename = "4H")]
    H4,
    #[serde(rename = "1D")]
    D1,
}

impl Timeframe {
    /// The `bar` query parameter value the exchange expects.
    pub fn bar(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1H",
            Timeframe::H4 => "4H",
            Timeframe::D1 => "1D",
        }
    }

    /// Interval length in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.bar())
    }
}

// ============================================================================
// Market Data Types
// ============================================================================

/// One OHLCV bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Bar open time
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Base volume traded during the bar
    pub volume: f64,
}

/// A tradable instrument as listed by the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    /// Exchange symbol, e.g. `BTC-USDT-SWAP`
    pub inst_id: String,
    /// Instrument class, e.g. `SWAP`
    pub inst_type: String,
    /// Settlement currency for derivatives
    pub settle_ccy: String,
    /// `linear` or `inverse` for contracts
    pub ct_type: String,
    /// Listing state; only `live` instruments are tradable
    pub state: String,
}

/// 24h ticker statistics for one instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub inst_id: String,
    /// Last traded price
    pub last: f64,
    /// 24h volume in quote currency terms
    pub quote_volume_24h: f64,
}

// ============================================================================
// Tests
// ============================================================================
