//! Symbol Screening Module.
//!
//! Scans the exchange's perpetual swap universe and keeps the symbols whose
//! technical indicators satisfy a configurable rule plan across several
//! timeframes.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     Screening run                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                              │
//! │  ┌────────────┐      ┌────────────┐      ┌───────────────┐  │
//! │  │  Universe  │─────▶│   Engine   │─────▶│   Snapshot    │  │
//! │  │ (tickers)  │      │ (fan-out)  │      │    (CSV)      │  │
//! │  └────────────┘      └─────┬──────┘      └───────────────┘  │
//! │                            │                                 │
//! │  ┌─────────────────────────┴──────────────────────┐         │
//! │  │        Per symbol, per timeframe screen        │         │
//! │  │  fetch candles → freshness → indicators →      │         │
//! │  │  rule tree (all screens must pass)             │         │
//! │  └────────────────────────────────────────────────┘         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sift_screener::screen::{ScreenEngine, ScreenPlan, SnapshotWriter};
//!
//! let plan = ScreenPlan::default();
//! let engine = ScreenEngine::new(plan.clone(), provider, screener_config);
//!
//! let result = engine.run_scan().await?;
//! SnapshotWriter::new("snapshots").write(&plan, &result)?;
//! ```

pub mod config;
pub mod engine;
pub mod rules;
pub mod snapshot;
pub mod universe;

pub use config::{ScreenPlan, TimeframeScreen};
pub use engine::{ScreenEngine, ScreenResult, ScreenedSymbol, SkipReason, SkippedSymbol};
pub use rules::{Comparison, Operand, Rule};
pub use snapshot::SnapshotWriter;
pub use universe::select_universe;
