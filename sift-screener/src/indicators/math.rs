//! Pure indicator math over price and volume series.
//!
//! Every function is deterministic, takes its series oldest first, and
//! returns `None` when the series is shorter than the window it needs.

// ============================================================================
// Moving Averages
// ============================================================================

/// Simple moving average of the last `period` values.
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let sum: f64 = values[values.len() - period..].iter().sum();
    Some(sum / period as f64)
}

/// Exponential moving average of the whole series.
///
/// Seeded with the SMA of the first `period` values, then smoothed with
/// `alpha = 2 / (period + 1)`.
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).and_then(|series| series.last().copied())
}

/// EMA value at every index from the seed onwards.
fn ema_series(values: &[f64], period: usize) -> Option<Vec<f64>> {
    if period == 0 || values.len() < period {
        return None;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut series = Vec::with_capacity(values.len() - period + 1);
    series.push(seed);

    let mut prev = seed;
    for &value in &values[period..] {
        prev = alpha * value + (1.0 - alpha) * prev;
        series.push(prev);
    }

    Some(series)
}

// ============================================================================
// RSI
// ============================================================================

/// Relative Strength Index over the last `period` changes.
///
/// RSI = 100 - 100 / (1 + RS), RS = average gain / average loss, both
/// simple averages. A lossless window reads as 100.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let mut gains = 0.0;
    let mut losses = 0.0;

    for i in values.len() - period..values.len() {
        let change = values[i] - values[i - 1];
        if change > 0.0 {
            gains += change;
        } else {
            losses += change.abs();
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

// ============================================================================
// MACD
// ============================================================================

/// MACD output at the newest bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Macd {
    /// Fast EMA minus slow EMA
    pub macd: f64,
    /// EMA of the MACD line
    pub signal: f64,
    /// MACD minus signal
    pub histogram: f64,
}

/// Moving Average Convergence Divergence.
///
/// Needs at least `slow + signal - 1` values: the MACD line exists once
/// the slow EMA does, and the signal line needs `signal` MACD points.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Option<Macd> {
    if fast == 0 || signal == 0 || fast >= slow {
        return None;
    }

    let fast_series = ema_series(values, fast)?;
    let slow_series = ema_series(values, slow)?;

    // Align the two series on the index where the slow EMA starts
    let offset = slow - fast;
    let macd_series: Vec<f64> = slow_series
        .iter()
        .zip(fast_series[offset..].iter())
        .map(|(slow_ema, fast_ema)| fast_ema - slow_ema)
        .collect();

    let signal_series = ema_series(&macd_series, signal)?;

    let macd_line = *macd_series.last()?;
    let signal_line = *signal_series.last()?;

    Some(Macd {
        macd: macd_line,
        signal: signal_line,
        histogram: macd_line - signal_line,
    })
}

// ============================================================================
// Tests
// ============================================================================
