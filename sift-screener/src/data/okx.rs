//! OKX REST adapter for perpetual swap market data.
//!
//! # API Documentation
//! <https://www.okx.com/docs-v5/en/#public-data-rest-api>
//!
//! # Endpoints
//! - `/api/v5/public/instruments` - instrument listing
//! - `/api/v5/market/tickers` - 24h volume statistics
//! - `/api/v5/market/candles` - OHLCV history, paginated
//!
//! # Rate Limits
//! - Public endpoints: 20 requests per 2 seconds per endpoint
//! - Proactive throttling enabled to avoid 429 errors
//!
//! All endpoints used here are public; no API key is required.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use sift_common::config::ExchangeConfig;

use super::provider::{MarketDataProvider, ProviderError};
use super::rate_limiter::{shared_limiter, SharedRateLimiter};
use super::{Candle, Instrument, Ticker, Timeframe};

// ============================================================================
// Constants
// ============================================================================

/// Instrument listing endpoint
const INSTRUMENTS_ENDPOINT: &str = "/api/v5/public/instruments";

/// 24h ticker statistics endpoint
const TICKERS_ENDPOINT: &str = "/api/v5/market/tickers";

/// Candle history endpoint
const CANDLES_ENDPOINT: &str = "/api/v5/market/candles";

/// Instrument class this pipeline screens
const INST_TYPE: &str = "SWAP";

/// The exchange caps candle responses at 300 rows per request
const MAX_CANDLES_PER_PAGE: usize = 300;

/// Default rate limit when none is configured
const DEFAULT_RATE_LIMIT_RPM: u32 = 600;

/// Default request timeout (seconds)
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Retry delay after a rate limit error (seconds)
const RATE_LIMIT_RETRY_SECS: u64 = 2;

// ============================================================================
// OKX Provider
// ============================================================================

/// OKX adapter for perpetual swap market data.
///
/// Candle requests larger than one exchange page are transparently
/// paginated backwards through history and returned as a single
/// ascending series.
pub struct OkxProvider {
    /// Base URL without trailing slash
    base_url: String,
    /// HTTP client
    client: reqwest::Client,
    /// Shared throttle applied before every request
    rate_limiter: SharedRateLimiter,
    /// Rows requested per candle page
    candles_per_page: usize,
}

impl OkxProvider {
    /// Create an adapter with default timeout, throttle and page size.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_settings(
            base_url,
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            shared_limiter("okx", DEFAULT_RATE_LIMIT_RPM),
            MAX_CANDLES_PER_PAGE,
        )
    }

    /// Create an adapter from exchange configuration, sharing `rate_limiter`
    /// with any other component talking to the same exchange.
    pub fn from_config(config: &ExchangeConfig, rate_limiter: SharedRateLimiter) -> Self {
        Self::with_settings(
            config.base_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
            rate_limiter,
            config.candles_per_page,
        )
    }

    fn with_settings(
        base_url: impl Into<String>,
        timeout: Duration,
        rate_limiter: SharedRateLimiter,
        candles_per_page: usize,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            rate_limiter,
            candles_per_page: candles_per_page.clamp(1, MAX_CANDLES_PER_PAGE),
        }
    }

    /// Issue one GET request and unwrap the exchange's response envelope.
    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, ProviderError> {
        let url = format!("{}{}", self.base_url, path_and_query);

        // Proactive throttle so concurrent fetches never trip the limit
        self.rate_limiter.acquire().await;

        debug!(url = %url, "Fetching from OKX");

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Network("Request timeout".into())
                } else if e.is_connect() {
                    ProviderError::Network("Connection failed".into())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited {
                retry_after_secs: Some(RATE_LIMIT_RETRY_SECS),
            });
        }

        if status.is_server_error() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Internal(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let envelope: OkxResponse<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("Failed to parse response: {}", e)))?;

        if envelope.code != "0" {
            return Err(envelope_error(&envelope.code, envelope.msg));
        }

        envelope
            .data
            .ok_or_else(|| ProviderError::Internal("Response missing data field".into()))
    }
}

/// Map the exchange's business error codes onto provider errors.
///
/// - 50011: rate limit hit despite the proactive throttle
/// - 51000: parameter error
/// - 51001: unknown instrument
fn envelope_error(code: &str, msg: String) -> ProviderError {
    match code {
        "50011" => ProviderError::RateLimited {
            retry_after_secs: Some(RATE_LIMIT_RETRY_SECS),
        },
        "51000" => ProviderError::InvalidRequest(msg),
        "51001" => ProviderError::DataNotAvailable(msg),
        _ => ProviderError::Internal(format!("Exchange error {}: {}", code, msg)),
    }
}

/// Parse raw candle rows into an ascending, deduplicated series.
///
/// The exchange encodes every field as a string and returns rows newest
/// first: `[ts, open, high, low, close, volume, ...]`.
fn parse_candles(
    symbol: &str,
    timeframe: Timeframe,
    rows: &[Vec<String>],
) -> Result<Vec<Candle>, ProviderError> {
    let mut candles = Vec::with_capacity(rows.len());

    for row in rows {
        if row.len() < 6 {
            return Err(ProviderError::Internal(format!(
                "Malformed candle row with {} fields",
                row.len()
            )));
        }

        let ts: i64 = row[0]
            .parse()
            .map_err(|_| ProviderError::Internal(format!("Invalid candle timestamp: {}", row[0])))?;
        let timestamp = Utc
            .timestamp_millis_opt(ts)
            .single()
            .ok_or_else(|| ProviderError::Internal(format!("Invalid candle timestamp: {}", ts)))?;

        candles.push(Candle {
            symbol: symbol.to_string(),
            timeframe,
            timestamp,
            open: parse_decimal(&row[1])?,
            high: parse_decimal(&row[2])?,
            low: parse_decimal(&row[3])?,
            close: parse_decimal(&row[4])?,
            volume: parse_decimal(&row[5])?,
        });
    }

    // Oldest first for the indicator pipeline; overlapping pages may repeat bars
    candles.sort_by_key(|c| c.timestamp);
    candles.dedup_by_key(|c| c.timestamp);

    Ok(candles)
}

fn parse_decimal(raw: &str) -> Result<f64, ProviderError> {
    raw.parse()
        .map_err(|_| ProviderError::Internal(format!("Invalid numeric field: {}", raw)))
}

// ============================================================================
// MarketDataProvider Implementation
// ============================================================================

#[async_trait]
impl MarketDataProvider for OkxProvider {
    fn name(&self) -> &'static str {
        "okx"
    }

    async fn list_instruments(&self) -> Result<Vec<Instrument>, ProviderError> {
        let path = format!("{}?instType={}", INSTRUMENTS_ENDPOINT, INST_TYPE);
        let rows: Vec<OkxInstrument> = self.get_json(&path).await?;

        Ok(rows.into_iter().map(Instrument::from).collect())
    }

    async fn get_tickers(&self) -> Result<Vec<Ticker>, ProviderError> {
        let path = format!("{}?instType={}", TICKERS_ENDPOINT, INST_TYPE);
        let rows: Vec<OkxTicker> = self.get_json(&path).await?;

        Ok(rows.into_iter().map(Ticker::from).collect())
    }

    async fn get_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ProviderError> {
        let mut rows: Vec<Vec<String>> = Vec::with_capacity(limit);
        let mut after: Option<i64> = None;

        while rows.len() < limit {
            let request_limit = self.candles_per_page.min(limit - rows.len());

            let mut path = format!(
                "{}?instId={}&bar={}&limit={}",
                CANDLES_ENDPOINT,
                symbol,
                timeframe.bar(),
                request_limit
            );
            if let Some(cursor) = after {
                path.push_str(&format!("&after={}", cursor));
            }

            let page: Vec<Vec<String>> = self.get_json(&path).await?;
            if page.is_empty() {
                break;
            }

            let exhausted = page.len() < request_limit;

            // Rows come newest first, so the page's last row is its oldest
            let oldest: i64 = match page.last().and_then(|row| row.first()) {
                Some(ts) => ts.parse().map_err(|_| {
                    ProviderError::Internal(format!("Invalid candle timestamp: {}", ts))
                })?,
                None => return Err(ProviderError::Internal("Malformed candle row".into())),
            };

            rows.extend(page);

            // Stop on a short page (history exhausted) or a stuck cursor
            if exhausted || Some(oldest) == after {
                break;
            }
            after = Some(oldest);
        }

        let mut candles = parse_candles(symbol, timeframe, &rows)?;
        if candles.len() > limit {
            candles.drain(..candles.len() - limit);
        }

        Ok(candles)
    }
}

// ============================================================================
// API Response Types
// ============================================================================

/// OKX response envelope.
///
/// `code` is a string; "0" means success, anything else carries a
/// business error even when the HTTP status is 200.
#[derive(Debug, Deserialize)]
struct OkxResponse<T> {
    code: String,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

/// Instrument row from `/api/v5/public/instruments`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxInstrument {
    inst_id: String,
    inst_type: String,
    #[serde(default)]
    settle_ccy: String,
    #[serde(default)]
    ct_type: String,
    state: String,
}

impl From<OkxInstrument> for Instrument {
    fn from(raw: OkxInstrument) -> Self {
        Self {
            inst_id: raw.inst_id,
            inst_type: raw.inst_type,
            settle_ccy: raw.settle_ccy,
            ct_type: raw.ct_type,
            state: raw.state,
        }
    }
}

/// Ticker row from `/api/v5/market/tickers`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OkxTicker {
    inst_id: String,
    #[serde(default)]
    last: String,
    #[serde(default)]
    vol_ccy24h: String,
}

impl From<OkxTicker> for Ticker {
    fn from(raw: OkxTicker) -> Self {
        Self {
            inst_id: raw.inst_id,
            // Instruments with no trades report empty strings; rank them at zero
            last: raw.last.parse().unwrap_or(0.0),
            quote_volume_24h: raw.vol_ccy24h.parse().unwrap_or(0.0),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_provider(server: &MockServer) -> OkxProvider {
        test_provider_paged(server, MAX_CANDLES_PER_PAGE)
    }

    fn test_provider_paged(server: &MockServer, candles_per_page: usize) -> OkxProvider {
        let config = ExchangeConfig {
            base_url: server.uri(),
            candles_per_page,
            ..Default::default()
        };
        // Generous throttle so tests never sleep
        OkxProvider::from_config(&config, shared_limiter("okx-test", 60_000))
    }

    fn candle_row(ts: i64, close: f64, volume: f64) -> serde_json::Value {
        json!([
            ts.to_string(),
            "1.0",
            "2.0",
            "0.5",
            close.to_string(),
            volume.to_string(),
            "0",
            "0",
            "1"
        ])
    }

    #[tokio::test]
    async fn test_list_instruments() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(INSTRUMENTS_ENDPOINT))
            .and(query_param("instType", "SWAP"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "msg": "",
                "data": [
                    {
                        "instId": "BTC-USDT-SWAP",
                        "instType": "SWAP",
                        "settleCcy": "USDT",
                        "ctType": "linear",
                        "state": "live"
                    },
                    {
                        "instId": "BTC-USD-SWAP",
                        "instType": "SWAP",
                        "settleCcy": "BTC",
                        "ctType": "inverse",
                        "state": "live"
                    }
                ]
            })))
            .mount(&server)
            .await;

        let provider = test_provider(&server);
        let instruments = provider.list_instruments().await.unwrap();

        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].inst_id, "BTC-USDT-SWAP");
        assert_eq!(instruments[0].settle_ccy, "USDT");
        assert_eq!(instruments[0].ct_type, "linear");
        assert_eq!(instruments[1].ct_type, "inverse");
    }

    #[tokio::test]
    async fn test_get_tickers_parses_string_volumes() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TICKERS_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "msg": "",
                "data": [
                    { "instId": "BTC-USDT-SWAP", "last": "59750.2", "volCcy24h": "1500000000.5" },
                    { "instId": "DEAD-USDT-SWAP", "last": "", "volCcy24h": "" }
                ]
            })))
            .mount(&server)
            .await;

        let provider = test_provider(&server);
        let tickers = provider.get_tickers().await.unwrap();

        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].last, 59750.2);
        assert_eq!(tickers[0].quote_volume_24h, 1_500_000_000.5);
        // Empty numeric fields degrade to zero rather than failing the call
        assert_eq!(tickers[1].quote_volume_24h, 0.0);
    }

    #[tokio::test]
    async fn test_candles_sorted_ascending() {
        let server = MockServer::start().await;

        // Exchange order: newest first
        Mock::given(method("GET"))
            .and(path(CANDLES_ENDPOINT))
            .and(query_param("instId", "BTC-USDT-SWAP"))
            .and(query_param("bar", "15m"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "msg": "",
                "data": [
                    candle_row(3_000_000, 103.0, 30.0),
                    candle_row(2_000_000, 102.0, 20.0),
                    candle_row(1_000_000, 101.0, 10.0)
                ]
            })))
            .mount(&server)
            .await;

        let provider = test_provider(&server);
        let candles = provider
            .get_candles("BTC-USDT-SWAP", Timeframe::M15, 3)
            .await
            .unwrap();

        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].close, 101.0);
        assert_eq!(candles[2].close, 103.0);
        assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert_eq!(candles[0].symbol, "BTC-USDT-SWAP");
        assert_eq!(candles[0].timeframe, Timeframe::M15);
    }

    #[tokio::test]
    async fn test_candles_deduplicate_repeated_timestamps() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CANDLES_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "msg": "",
                "data": [
                    candle_row(2_000_000, 102.0, 20.0),
                    candle_row(2_000_000, 102.5, 21.0),
                    candle_row(1_000_000, 101.0, 10.0)
                ]
            })))
            .mount(&server)
            .await;

        let provider = test_provider(&server);
        let candles = provider
            .get_candles("BTC-USDT-SWAP", Timeframe::M15, 10)
            .await
            .unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].timestamp.timestamp_millis(), 2_000_000);
    }

    #[tokio::test]
    async fn test_candles_paginate_past_page_limit() {
        let server = MockServer::start().await;

        // First page: no cursor, newest two bars
        Mock::given(method("GET"))
            .and(path(CANDLES_ENDPOINT))
            .and(query_param("limit", "2"))
            .and(query_param_is_missing("after"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "msg": "",
                "data": [
                    candle_row(4_000_000, 104.0, 40.0),
                    candle_row(3_000_000, 103.0, 30.0)
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        // Second page: cursor at the oldest bar seen so far
        Mock::given(method("GET"))
            .and(path(CANDLES_ENDPOINT))
            .and(query_param("after", "3000000"))
            .and(query_param("limit", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "msg": "",
                "data": [candle_row(2_000_000, 102.0, 20.0)]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = test_provider_paged(&server, 2);
        let candles = provider
            .get_candles("BTC-USDT-SWAP", Timeframe::M15, 3)
            .await
            .unwrap();

        assert_eq!(candles.len(), 3);
        assert_eq!(candles[0].close, 102.0);
        assert_eq!(candles[2].close, 104.0);
    }

    #[tokio::test]
    async fn test_candles_stop_on_short_page() {
        let server = MockServer::start().await;

        // History has fewer bars than requested
        Mock::given(method("GET"))
            .and(path(CANDLES_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "msg": "",
                "data": [candle_row(1_000_000, 101.0, 10.0)]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = test_provider_paged(&server, 2);
        let candles = provider
            .get_candles("NEW-USDT-SWAP", Timeframe::H1, 10)
            .await
            .unwrap();

        assert_eq!(candles.len(), 1);
    }

    #[tokio::test]
    async fn test_http_429_maps_to_rate_limited() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CANDLES_ENDPOINT))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let provider = test_provider(&server);
        let err = provider
            .get_candles("BTC-USDT-SWAP", Timeframe::M15, 10)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::RateLimited { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_http_5xx_maps_to_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(TICKERS_ENDPOINT))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = test_provider(&server);
        let err = provider.get_tickers().await.unwrap_err();

        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert!(err.is_recoverable());
    }

    #[tokio::test]
    async fn test_envelope_error_code_maps_to_data_not_available() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CANDLES_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "51001",
                "msg": "Instrument ID does not exist",
                "data": []
            })))
            .mount(&server)
            .await;

        let provider = test_provider(&server);
        let err = provider
            .get_candles("NOPE-USDT-SWAP", Timeframe::M15, 10)
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::DataNotAvailable(_)));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_empty_data_is_not_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(CANDLES_ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": "0",
                "msg": "",
                "data": []
            })))
            .mount(&server)
            .await;

        let provider = test_provider(&server);
        let candles = provider
            .get_candles("BTC-USDT-SWAP", Timeframe::M15, 10)
            .await
            .unwrap();

        assert!(candles.is_empty());
    }

    // Integration tests against the real exchange
    // Run with: cargo test -- --ignored

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_live_candles() {
        let provider = OkxProvider::new("https://www.okx.com");

        let candles = provider
            .get_candles("BTC-USDT-SWAP", Timeframe::M15, 5)
            .await
            .unwrap();

        assert_eq!(candles.len(), 5);
        assert!(candles.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
        assert!(candles.iter().all(|c| c.close > 0.0));
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_fetch_live_instruments() {
        let provider = OkxProvider::new("https://www.okx.com");

        let instruments = provider.list_instruments().await.unwrap();

        assert!(instruments.iter().any(|i| i.inst_id == "BTC-USDT-SWAP"));
    }
}
