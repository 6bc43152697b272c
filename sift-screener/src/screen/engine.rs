//! Screening engine.
//!
//! The central orchestrator for one screening run: universe selection,
//! bounded-concurrency symbol evaluation, and result assembly. Per-symbol
//! problems are absorbed into the result; only a run that cannot start
//! (universe unavailable) surfaces as an error.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use sift_common::config::ScreenerConfig;

use crate::data::{Candle, MarketDataProvider, ProviderError, Timeframe};
use crate::indicators;

use super::config::ScreenPlan;
use super::universe;

// ============================================================================
// Run Outcome Types
// ============================================================================

/// A symbol that passed every timeframe screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenedSymbol {
    /// Exchange symbol (e.g., "BTC-USDT-SWAP")
    pub symbol: String,
    /// Timeframe-prefixed indicator values backing the verdict
    pub values: BTreeMap<String, f64>,
}

/// Why a symbol left the run without a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Every fetch attempt failed
    FetchFailed,
    /// The newest bar was older than its timeframe interval
    StaleData,
    /// The exchange returned no bars at all
    EmptySeries,
    /// Evaluation did not finish before the run deadline
    Timeout,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::FetchFailed => "fetch failed",
            Self::StaleData => "stale data",
            Self::EmptySeries => "empty series",
            Self::Timeout => "run timeout",
        };
        write!(f, "{}", reason)
    }
}

/// A symbol excluded from the run, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedSymbol {
    pub symbol: String,
    pub reason: SkipReason,
}

/// Result of one screening run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenResult {
    /// Run identifier: the start time as Unix milliseconds
    pub id: String,
    /// Passing symbols, sorted by symbol
    pub rows: Vec<ScreenedSymbol>,
    /// Symbols evaluated and rejected by the rules
    pub failed: usize,
    /// Symbols excluded before a verdict, sorted by symbol
    pub skipped: Vec<SkippedSymbol>,
    /// Universe size this run started from
    pub total_scanned: usize,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub completed_at: DateTime<Utc>,
    /// Duration in seconds
    pub duration_secs: f64,
}

impl ScreenResult {
    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Screened {} symbols in {:.1}s: {} passed, {} failed, {} skipped",
            self.total_scanned,
            self.duration_secs,
            self.rows.len(),
            self.failed,
            self.skipped.len()
        )
    }
}

/// Verdict for one symbol.
enum SymbolOutcome {
    Passed(ScreenedSymbol),
    Failed,
    Skipped(SkipReason),
}

// ============================================================================
// Screen Engine
// ============================================================================

/// The screening engine.
///
/// Orchestrates one run:
/// 1. Fetch the instrument list and tickers (fatal if the exchange is unreachable)
/// 2. Select the universe (top-volume eligible swaps)
/// 3. Evaluate symbols concurrently under a worker bound and shared throttle
/// 4. Drain results under the run deadline and assemble the result
pub struct ScreenEngine<P: MarketDataProvider> {
    plan: Arc<ScreenPlan>,
    provider: Arc<P>,
    config: ScreenerConfig,
}

impl<P: MarketDataProvider + 'static> ScreenEngine<P> {
    /// Create an engine for one plan, provider and run configuration.
    pub fn new(plan: ScreenPlan, provider: Arc<P>, config: ScreenerConfig) -> Self {
        Self {
            plan: Arc::new(plan),
            provider,
            config,
        }
    }

    /// Run one full screening pass.
    pub async fn run_scan(&self) -> Result<ScreenResult> {
        let started_at = Utc::now();
        let id = started_at.timestamp_millis().to_string();

        info!(
            run_id = %id,
            provider = self.provider.name(),
            screens = self.plan.screens.len(),
            "Starting screening run"
        );

        // Phase 1: universe
        let symbols = self.fetch_universe().await?;
        info!(run_id = %id, universe = symbols.len(), "Universe selected");

        // Phase 2: fan out one task per symbol, bounded by a semaphore
        let deadline =
            tokio::time::Instant::now() + Duration::from_secs(self.config.run_timeout_secs);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for symbol in &symbols {
            let symbol = symbol.clone();
            let plan = Arc::clone(&self.plan);
            let provider = Arc::clone(&self.provider);
            let semaphore = Arc::clone(&semaphore);
            let retries = self.config.fetch_retries;
            let backoff_ms = self.config.retry_backoff_ms;

            join_set.spawn(async move {
                // Hold the permit for the whole symbol so in-flight work stays bounded
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (symbol, SymbolOutcome::Skipped(SkipReason::Timeout)),
                };

                let outcome =
                    evaluate_symbol(&plan, provider.as_ref(), &symbol, retries, backoff_ms).await;
                (symbol, outcome)
            });
        }

        // Phase 3: drain under the deadline
        let mut pending: BTreeSet<String> = symbols.iter().cloned().collect();
        let mut rows = Vec::new();
        let mut failed = 0usize;
        let mut skipped = Vec::new();

        loop {
            let joined = match tokio::time::timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(joined)) => joined,
                Ok(None) => break,
                Err(_) => {
                    join_set.abort_all();
                    warn!(
                        run_id = %id,
                        remaining = pending.len(),
                        "Run deadline reached, recording unfinished symbols as skipped"
                    );
                    for symbol in std::mem::take(&mut pending) {
                        skipped.push(SkippedSymbol {
                            symbol,
                            reason: SkipReason::Timeout,
                        });
                    }
                    break;
                }
            };

            match joined {
                Ok((symbol, outcome)) => {
                    pending.remove(&symbol);
                    match outcome {
                        SymbolOutcome::Passed(row) => {
                            debug!(symbol = %row.symbol, "Symbol passed all screens");
                            rows.push(row);
                        }
                        SymbolOutcome::Failed => failed += 1,
                        SymbolOutcome::Skipped(reason) => {
                            debug!(symbol = %symbol, reason = %reason, "Symbol skipped");
                            skipped.push(SkippedSymbol { symbol, reason });
                        }
                    }
                }
                Err(join_error) => {
                    // A crashed task costs only its own symbol
                    warn!(error = %join_error, "Symbol evaluation task failed");
                }
            }
        }

        // A crashed task leaves its symbol in `pending`; account for it
        for symbol in pending {
            skipped.push(SkippedSymbol {
                symbol,
                reason: SkipReason::FetchFailed,
            });
        }

        // Stable output order regardless of completion order
        rows.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        skipped.sort_by(|a, b| a.symbol.cmp(&b.symbol));

        let completed_at = Utc::now();
        let duration_secs = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let result = ScreenResult {
            id,
            rows,
            failed,
            skipped,
            total_scanned: symbols.len(),
            started_at,
            completed_at,
            duration_secs,
        };

        info!(
            run_id = %result.id,
            passed = result.rows.len(),
            failed = result.failed,
            skipped = result.skipped.len(),
            duration = format!("{:.1}s", duration_secs),
            "Screening run complete"
        );

        Ok(result)
    }

    /// Fetch instruments and tickers and select the universe.
    ///
    /// Unlike per-symbol fetches, total failure here fails the run: without
    /// a universe there is nothing to screen.
    async fn fetch_universe(&self) -> Result<Vec<String>> {
        let instruments = fetch_with_retry(
            || self.provider.list_instruments(),
            "instruments",
            self.config.fetch_retries,
            self.config.retry_backoff_ms,
        )
        .await
        .context("Failed to list instruments from the exchange")?;

        let tickers = fetch_with_retry(
            || self.provider.get_tickers(),
            "tickers",
            self.config.fetch_retries,
            self.config.retry_backoff_ms,
        )
        .await
        .context("Failed to fetch tickers from the exchange")?;

        Ok(universe::select_universe(
            &instruments,
            &tickers,
            self.config.universe_size,
        ))
    }
}

// ============================================================================
// Per-Symbol Evaluation
// ============================================================================

/// Evaluate one symbol against every timeframe screen in the plan.
async fn evaluate_symbol<P: MarketDataProvider>(
    plan: &ScreenPlan,
    provider: &P,
    symbol: &str,
    retries: u32,
    backoff_ms: u64,
) -> SymbolOutcome {
    let mut values = BTreeMap::new();

    for screen in &plan.screens {
        let candles = match fetch_with_retry(
            || provider.get_candles(symbol, screen.timeframe, screen.lookback),
            "candles",
            retries,
            backoff_ms,
        )
        .await
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!(
                    symbol,
                    timeframe = %screen.timeframe,
                    error = %e,
                    "Dropping symbol after failed fetches"
                );
                return SymbolOutcome::Skipped(SkipReason::FetchFailed);
            }
        };

        let Some(last) = candles.last() else {
            return SymbolOutcome::Skipped(SkipReason::EmptySeries);
        };

        if screen.freshness_check && is_stale(last, screen.timeframe) {
            return SymbolOutcome::Skipped(SkipReason::StaleData);
        }

        let computed = indicators::compute(&screen.indicators, &candles);

        // Any undefined required indicator fails the symbol outright; this
        // keeps `not` rules from passing on missing data
        let required = screen.rules.required_indicators();
        if required.iter().any(|name| !computed.contains_key(name)) {
            debug!(
                symbol,
                timeframe = %screen.timeframe,
                "Required indicator undefined, failing symbol"
            );
            return SymbolOutcome::Failed;
        }

        if !screen.rules.evaluate(&computed) {
            return SymbolOutcome::Failed;
        }

        for (name, value) in computed {
            values.insert(format!("{}_{}", screen.timeframe, name), value);
        }
    }

    SymbolOutcome::Passed(ScreenedSymbol {
        symbol: symbol.to_string(),
        values,
    })
}

/// A series is stale when its newest bar is more than one interval old.
fn is_stale(last: &Candle, timeframe: Timeframe) -> bool {
    let age = Utc::now() - last.timestamp;
    age.num_seconds() > i64::from(timeframe.minutes()) * 60
}

/// Retry a provider call with linear backoff, giving up immediately on
/// non-recoverable errors.
async fn fetch_with_retry<T, F, Fut>(
    mut operation: F,
    what: &str,
    max_attempts: u32,
    backoff_ms: u64,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_error = ProviderError::Internal("No attempts made".into());

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                let recoverable = e.is_recoverable();
                warn!(
                    what,
                    attempt,
                    max_attempts,
                    error = %e,
                    "Fetch attempt failed"
                );
                last_error = e;

                if !recoverable || attempt == max_attempts {
                    break;
                }

                // Rate limit errors may carry their own wait hint
                let wait = match &last_error {
                    ProviderError::RateLimited {
                        retry_after_secs: Some(secs),
                    } => Duration::from_secs(*secs),
                    _ => Duration::from_millis(backoff_ms * u64::from(attempt)),
                };
                tokio::time::sleep(wait).await;
            }
        }
    }

    Err(last_error)
}

// ============================================================================
// Tests
// ============================================================================
