//! Sift Screener Library
//!
//! A batch screening pipeline for exchange-traded perpetual swaps: fetch the
//! symbol universe and recent OHLCV history, compute technical indicators,
//! apply a configurable rule plan, and write the passing set as a timestamped
//! CSV snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       sift-screener                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌───────────────┐  ┌───────────────┐  ┌───────────────┐   │
//! │  │  Market Data  │  │   Screening   │  │   Snapshot    │   │
//! │  │  (OKX REST)   │  │    Engine     │  │    Writer     │   │
//! │  └───────────────┘  └───────────────┘  └───────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Run
//! One stateless batch pass: universe → per-symbol evaluation → snapshot.
//! Scheduling recurring runs is the caller's concern.
//!
//! ## Screen Plan
//! A list of per-timeframe screens; a symbol must pass all of them. Each
//! screen names its timeframe, lookback, indicator set and rule tree.
//!
//! ## Failure Containment
//! A symbol whose data cannot be fetched, or arrives stale or empty, costs
//! only that symbol. The run fails only when the universe itself cannot be
//! fetched or the snapshot cannot be written.

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod indicators;
pub mod screen;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use sift_common::config::Config;

use crate::data::{shared_limiter, OkxProvider};
use crate::screen::{ScreenEngine, ScreenPlan, ScreenResult, SnapshotWriter};

/// Ties configuration, provider, engine and writer together for one run.
pub struct ScreenerService {
    config: Config,
}

impl ScreenerService {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Execute one screening run end to end and write its snapshot.
    ///
    /// Per-symbol problems are absorbed into the result. An error here means
    /// the run itself failed: bad plan, exchange unreachable, or the snapshot
    /// could not be written.
    pub async fn run_once(&self) -> Result<ScreenResult> {
        let plan = self.load_plan()?;

        let limiter = shared_limiter("okx", self.config.exchange.requests_per_minute);
        let provider = Arc::new(OkxProvider::from_config(&self.config.exchange, limiter));
        let engine = ScreenEngine::new(plan.clone(), provider, self.config.screener.clone());

        let result = engine.run_scan().await?;

        let writer = SnapshotWriter::new(self.config.screener.output_dir.as_str());
        let path = writer
            .write(&plan, &result)
            .context("Failed to write run snapshot")?;

        tracing::info!(snapshot = %path.display(), "{}", result.summary());
        Ok(result)
    }

    /// Load the screening plan from configuration, or fall back to the
    /// built-in momentum plan.
    fn load_plan(&self) -> Result<ScreenPlan> {
        let plan = match self.config.screener.plan_path.as_deref() {
            Some(path) => ScreenPlan::load_from(Path::new(path))?,
            None => ScreenPlan::default(),
        };
        plan.validate()?;
        Ok(plan)
    }
}
