//! Universe selection.
//!
//! Filters the exchange's instrument list down to live USDT-settled linear
//! perpetual swaps and keeps the top names by 24h quote volume.

use std::collections::HashMap;

use crate::data::{Instrument, Ticker};

/// Eligibility filter for the screened universe.
fn is_eligible(instrument: &Instrument) -> bool {
    instrument.state == "live"
        && instrument.inst_type == "SWAP"
        && instrument.settle_ccy == "USDT"
        && instrument.ct_type == "linear"
}

/// Select the screening universe: eligible instruments ranked by 24h quote
/// volume, truncated to `size` symbols.
///
/// Instruments without a ticker rank at zero volume. Ties break on symbol
/// so the same inputs always yield the same universe.
pub fn select_universe(instruments: &[Instrument], tickers: &[Ticker], size: usize) -> Vec<String> {
    let volumes: HashMap<&str, f64> = tickers
        .iter()
        .map(|ticker| (ticker.inst_id.as_str(), ticker.quote_volume_24h))
        .collect();

    let mut ranked: Vec<(&str, f64)> = instruments
        .iter()
        .filter(|instrument| is_eligible(instrument))
        .map(|instrument| {
            let volume = volumes
                .get(instrument.inst_id.as_str())
                .copied()
                .unwrap_or(0.0);
            (instrument.inst_id.as_str(), volume)
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(b.0))
    });

    ranked
        .into_iter()
        .take(size)
        .map(|(symbol, _)| symbol.to_string())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
