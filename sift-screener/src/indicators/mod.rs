//! Indicator computation over OHLCV series.
//!
//! An `IndicatorConfig` describes which indicators to derive from a candle
//! series; `compute` evaluates them into a name -> value mapping. Indicators
//! whose window exceeds the available history are simply absent from the
//! output, never guessed.

pub mod math;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::data::Candle;

// ============================================================================
// Configuration
// ============================================================================

/// MACD parameter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacdConfig {
    #[serde(default = "default_macd_fast")]
    pub fast: usize,
    #[serde(default = "default_macd_slow")]
    pub slow: usize,
    #[serde(default = "default_macd_signal")]
    pub signal: usize,
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast: default_macd_fast(),
            slow: default_macd_slow(),
            signal: default_macd_signal(),
        }
    }
}

/// Which indicators to compute for one timeframe.
///
/// The newest bar's `close` and `volume` are always included. Emitted names
/// follow the configured periods: `ma10`, `vol_ma5`, `rsi7`, `rsi7_prev`,
/// `macd`, `macd_signal`, `macd_hist`, `volume_ratio`, `ma20_dev_pct`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorConfig {
    /// Close-price SMA periods
    #[serde(default = "default_ma_periods")]
    pub ma_periods: Vec<usize>,
    /// Volume SMA periods
    #[serde(default = "default_volume_ma_periods")]
    pub volume_ma_periods: Vec<usize>,
    /// RSI period; also emits the previous bar's RSI
    #[serde(default = "default_rsi_period")]
    pub rsi_period: Option<usize>,
    /// MACD parameters
    #[serde(default = "default_macd")]
    pub macd: Option<MacdConfig>,
    /// Newest volume relative to the mean of this many prior volumes
    #[serde(default = "default_volume_ratio_window")]
    pub volume_ratio_window: Option<usize>,
    /// Percent deviation of close from this period's SMA
    #[serde(default = "default_ma_deviation_period")]
    pub ma_deviation_period: Option<usize>,
}

fn default_ma_periods() -> Vec<usize> {
    vec![5, 10, 20]
}

fn default_volume_ma_periods() -> Vec<usize> {
    vec![5, 10]
}

fn default_rsi_period() -> Option<usize> {
    Some(7)
}

fn default_macd() -> Option<MacdConfig> {
    Some(MacdConfig::default())
}

fn default_volume_ratio_window() -> Option<usize> {
    Some(5)
}

fn default_ma_deviation_period() -> Option<usize> {
    Some(20)
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_periods: default_ma_periods(),
            volume_ma_periods: default_volume_ma_periods(),
            rsi_period: default_rsi_period(),
            macd: default_macd(),
            volume_ratio_window: default_volume_ratio_window(),
            ma_deviation_period: default_ma_deviation_period(),
        }
    }
}

impl IndicatorConfig {
    /// Every name this configuration can emit, in a fixed order.
    pub fn names(&self) -> Vec<String> {
        let mut names = vec!["close".to_string(), "volume".to_string()];

        for period in &self.ma_periods {
            names.push(format!("ma{}", period));
        }
        for period in &self.volume_ma_periods {
            names.push(format!("vol_ma{}", period));
        }
        if self.volume_ratio_window.is_some() {
            names.push("volume_ratio".to_string());
        }
        if let Some(period) = self.rsi_period {
            names.push(format!("rsi{}", period));
            names.push(format!("rsi{}_prev", period));
        }
        if self.macd.is_some() {
            names.push("macd".to_string());
            names.push("macd_signal".to_string());
            names.push("macd_hist".to_string());
        }
        if let Some(period) = self.ma_deviation_period {
            names.push(format!("ma{}_dev_pct", period));
        }

        names
    }

    /// Bars needed for every configured indicator to be defined.
    pub fn required_bars(&self) -> usize {
        let mut required = 1;

        for &period in &self.ma_periods {
            required = required.max(period);
        }
        for &period in &self.volume_ma_periods {
            required = required.max(period);
        }
        if let Some(period) = self.rsi_period {
            // The previous-bar RSI works on the series minus its last value
            required = required.max(period + 2);
        }
        if let Some(macd) = &self.macd {
            required = required.max(macd.slow + macd.signal - 1);
        }
        if let Some(window) = self.volume_ratio_window {
            required = required.max(window + 1);
        }
        if let Some(period) = self.ma_deviation_period {
            required = required.max(period);
        }

        required
    }
}

// ============================================================================
// Computation
// ============================================================================

/// Compute every configured indicator over an ascending candle series.
///
/// Returns name -> value. An indicator whose window exceeds the series
/// length, or whose denominator is zero, is left out of the map.
pub fn compute(config: &IndicatorConfig, candles: &[Candle]) -> BTreeMap<String, f64> {
    let mut values = BTreeMap::new();

    let Some(last) = candles.last() else {
        return values;
    };

    let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
    let volumes: Vec<f64> = candles.iter().map(|c| c.volume).collect();

    values.insert("close".to_string(), last.close);
    values.insert("volume".to_string(), last.volume);

    for &period in &config.ma_periods {
        if let Some(value) = math::sma(&closes, period) {
            values.insert(format!("ma{}", period), value);
        }
    }

    for &period in &config.volume_ma_periods {
        if let Some(value) = math::sma(&volumes, period) {
            values.insert(format!("vol_ma{}", period), value);
        }
    }

    if let Some(window) = config.volume_ratio_window {
        // Newest volume against the mean of the `window` volumes before it
        if let Some(base) = math::sma(&volumes[..volumes.len() - 1], window) {
            if base > 0.0 {
                values.insert("volume_ratio".to_string(), last.volume / base);
            }
        }
    }

    if let Some(period) = config.rsi_period {
        if let Some(value) = math::rsi(&closes, period) {
            values.insert(format!("rsi{}", period), value);
        }
        if let Some(value) = math::rsi(&closes[..closes.len() - 1], period) {
            values.insert(format!("rsi{}_prev", period), value);
        }
    }

    if let Some(macd) = &config.macd {
        if let Some(out) = math::macd(&closes, macd.fast, macd.slow, macd.signal) {
            values.insert("macd".to_string(), out.macd);
            values.insert("macd_signal".to_string(), out.signal);
            values.insert("macd_hist".to_string(), out.histogram);
        }
    }

    if let Some(period) = config.ma_deviation_period {
        if let Some(ma) = math::sma(&closes, period) {
            if ma != 0.0 {
                values.insert(
                    format!("ma{}_dev_pct", period),
                    (last.close - ma) / ma * 100.0,
                );
            }
        }
    }

    values
}

// ============================================================================
// Tests
// ============================================================================
