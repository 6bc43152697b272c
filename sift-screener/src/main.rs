//! Sift Screener - symbol screening pipeline for perpetual swap markets.
//!
//! Each invocation performs exactly one screening run and writes one CSV
//! snapshot. Recurring runs come from an external scheduler invoking this
//! binary; nothing is kept between runs.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use sift_common::config::Config;
use sift_common::logging::init_logging;
use sift_screener::ScreenerService;

#[derive(Parser)]
#[command(name = "sift-screener", version, about = "Market symbol screening pipeline")]
struct Cli {
    /// Path to the JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;
    config.validate()?;

    // Initialize logging
    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!("Sift Screener v{}", env!("CARGO_PKG_VERSION"));

    // One run per invocation
    let service = ScreenerService::new(config);
    service.run_once().await?;

    Ok(())
}
