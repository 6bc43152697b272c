//! Market data provider abstraction.
//!
//! Defines the `MarketDataProvider` trait the screening engine runs against,
//! so the engine can be exercised with an in-process mock in tests.

use async_trait::async_trait;
use std::fmt;

use super::{Candle, Instrument, Ticker, Timeframe};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to market data providers.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// Data not available for the requested symbol/timeframe
    DataNotAvailable(String),
    /// Exchange is temporarily unavailable
    Unavailable(String),
    /// Invalid request parameters
    InvalidRequest(String),
    /// Internal provider error (malformed response, parse failure)
    Internal(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::Unavailable(msg) => write!(f, "Exchange unavailable: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }
}

// ============================================================================
// Market Data Provider Trait
// ============================================================================

/// Trait for exchange market data sources.
///
/// All calls are read-only. Candle series are returned in ascending
/// timestamp order with at most `limit` bars, the newest bar last.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Provider name used in logs (e.g., "okx")
    fn name(&self) -> &'static str;

    /// List every instrument the exchange offers for the screened class.
    async fn list_instruments(&self) -> Result<Vec<Instrument>, ProviderError>;

    /// Fetch 24h ticker statistics for every instrument of the screened class.
    async fn get_tickers(&self) -> Result<Vec<Ticker>, ProviderError>;

    /// Fetch up to `limit` recent candles for one symbol and timeframe.
    ///
    /// # Arguments
    /// * `symbol` - Exchange symbol (e.g., "BTC-USDT-SWAP")
    /// * `timeframe` - Candle interval
    /// * `limit` - Maximum number of bars, newest last
    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================
