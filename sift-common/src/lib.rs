//! Sift Common - Shared configuration and logging for the sift pipeline.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Logging setup with noise filtering

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod logging;

pub use config::{Config, ExchangeConfig, ObservabilityConfig, ScreenerConfig};
pub use logging::init_logging;
