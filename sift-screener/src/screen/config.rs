//! Screening plan configuration.
//!
//! A `ScreenPlan` lists one screen per timeframe; a symbol must pass every
//! screen to make the snapshot. Plans load from JSON files, and the default
//! plan is a three-timeframe momentum screen: hourly trend alignment, a
//! quarter-hour setup with volume expansion, and a five-minute trigger.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::warn;

use crate::data::Timeframe;
use crate::indicators::IndicatorConfig;

use super::rules::{Comparison, Operand, Rule};

// ============================================================================
// Timeframe Screen
// ============================================================================

/// One timeframe's screen: what to fetch, what to compute, what must hold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeframeScreen {
    pub timeframe: Timeframe,
    /// Bars of history fetched for this timeframe
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// Drop symbols whose newest bar is older than one interval
    #[serde(default = "default_freshness_check")]
    pub freshness_check: bool,
    #[serde(default)]
    pub indicators: IndicatorConfig,
    pub rules: Rule,
}

fn default_lookback() -> usize {
    150
}

fn default_freshness_check() -> bool {
    true
}

// ============================================================================
// Screen Plan
// ============================================================================

/// The full screening plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenPlan {
    pub screens: Vec<TimeframeScreen>,
}

impl ScreenPlan {
    /// Load a plan from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read screening plan from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse screening plan from {}", path.display()))
    }

    /// Reject plans that cannot produce a meaningful run.
    pub fn validate(&self) -> Result<()> {
        if self.screens.is_empty() {
            bail!("Screening plan has no timeframe screens");
        }

        let mut seen = BTreeSet::new();
        for screen in &self.screens {
            if !seen.insert(screen.timeframe.bar()) {
                bail!(
                    "Screening plan lists the {} timeframe twice",
                    screen.timeframe
                );
            }

            if screen.lookback == 0 {
                bail!("{} screen has a zero lookback", screen.timeframe);
            }

            // Rules may only reference names the indicator set can emit
            let emitted: BTreeSet<String> = screen.indicators.names().into_iter().collect();
            for name in screen.rules.required_indicators() {
                if !emitted.contains(&name) {
                    bail!(
                        "{} screen rule references indicator '{}' which its indicator set does not produce",
                        screen.timeframe,
                        name
                    );
                }
            }

            let required = screen.indicators.required_bars();
            if screen.lookback < required {
                warn!(
                    timeframe = %screen.timeframe,
                    lookback = screen.lookback,
                    required,
                    "Lookback shorter than some indicator windows; those indicators will stay undefined"
                );
            }
        }

        Ok(())
    }

    /// Flattened, timeframe-prefixed snapshot column names in plan order.
    pub fn column_names(&self) -> Vec<String> {
        let mut columns = Vec::new();
        for screen in &self.screens {
            for name in screen.indicators.names() {
                columns.push(format!("{}_{}", screen.timeframe, name));
            }
        }
        columns
    }
}

/// The stock momentum screen: hourly trend, quarter-hour setup with volume
/// expansion, five-minute trigger.
impl Default for ScreenPlan {
    fn default() -> Self {
        Self {
            screens: vec![
                hourly_trend_screen(),
                quarter_hour_setup_screen(),
                five_minute_trigger_screen(),
            ],
        }
    }
}

/// 1H: price above a rising MA stack, positive momentum, volume building,
/// and not yet overextended from the 20-bar mean.
fn hourly_trend_screen() -> TimeframeScreen {
    TimeframeScreen {
        timeframe: Timeframe::H1,
        lookback: default_lookback(),
        freshness_check: default_freshness_check(),
        indicators: IndicatorConfig::default(),
        rules: Rule::all(vec![
            Rule::compare(Operand::ind("close"), Comparison::GreaterThan, Operand::ind("ma20")),
            Rule::compare(Operand::ind("ma10"), Comparison::GreaterThan, Operand::ind("ma20")),
            Rule::compare(Operand::ind("macd_hist"), Comparison::GreaterThan, Operand::lit(0.0)),
            Rule::compare(Operand::ind("ma20_dev_pct"), Comparison::LessThan, Operand::lit(2.0)),
            Rule::compare(Operand::ind("vol_ma5"), Comparison::GreaterThan, Operand::ind("vol_ma10")),
        ]),
    }
}

/// 15m: short MA crossed up, RSI in its working band, fresh volume surge.
fn quarter_hour_setup_screen() -> TimeframeScreen {
    TimeframeScreen {
        timeframe: Timeframe::M15,
        lookback: default_lookback(),
        freshness_check: default_freshness_check(),
        indicators: IndicatorConfig::default(),
        rules: Rule::all(vec![
            Rule::compare(Operand::ind("ma5"), Comparison::GreaterThan, Operand::ind("ma10")),
            Rule::compare(Operand::ind("rsi7"), Comparison::GreaterThan, Operand::lit(40.0)),
            Rule::compare(Operand::ind("rsi7"), Comparison::LessThan, Operand::lit(70.0)),
            Rule::compare(Operand::ind("volume_ratio"), Comparison::GreaterThan, Operand::lit(1.5)),
            Rule::compare(Operand::ind("vol_ma5"), Comparison::GreaterThan, Operand::ind("vol_ma10")),
        ]),
    }
}

/// 5m: RSI still climbing and momentum positive.
fn five_minute_trigger_screen() -> TimeframeScreen {
    TimeframeScreen {
        timeframe: Timeframe::M5,
        lookback: default_lookback(),
        freshness_check: default_freshness_check(),
        indicators: IndicatorConfig::default(),
        rules: Rule::all(vec![
            Rule::compare(Operand::ind("rsi7"), Comparison::GreaterThan, Operand::ind("rsi7_prev")),
            Rule::compare(Operand::ind("macd_hist"), Comparison::GreaterThan, Operand::lit(0.0)),
        ]),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_plan_validates() {
        let plan = ScreenPlan::default();
        assert!(plan.validate().is_ok());
        assert_eq!(plan.screens.len(), 3);
        assert_eq!(plan.screens[0].timeframe, Timeframe::H1);
        assert_eq!(plan.screens[1].timeframe, Timeframe::M15);
        assert_eq!(plan.screens[2].timeframe, Timeframe::M5);
        assert!(plan.screens.iter().all(|s| s.freshness_check));
    }

    #[test]
    fn test_default_plan_rules_reference_emitted_names() {
        for screen in ScreenPlan::default().screens {
            let emitted: BTreeSet<String> = screen.indicators.names().into_iter().collect();
            for name in screen.rules.required_indicators() {
                assert!(emitted.contains(&name), "{} not emitted", name);
            }
        }
    }

    #[test]
    fn test_column_names_are_timeframe_prefixed() {
        let columns = ScreenPlan::default().column_names();

        assert_eq!(columns[0], "1H_close");
        assert!(columns.contains(&"1H_ma20_dev_pct".to_string()));
        assert!(columns.contains(&"15m_volume_ratio".to_string()));
        assert!(columns.contains(&"5m_rsi7_prev".to_string()));

        // Fixed, duplicate-free order
        let unique: BTreeSet<&String> = columns.iter().collect();
        assert_eq!(unique.len(), columns.len());
        assert_eq!(columns, ScreenPlan::default().column_names());
    }

    #[test]
    fn test_validate_rejects_empty_plan() {
        let plan = ScreenPlan { screens: vec![] };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_timeframe() {
        let mut plan = ScreenPlan::default();
        let mut dup = plan.screens[0].clone();
        dup.lookback = 99;
        plan.screens.push(dup);

        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("twice"));
    }

    #[test]
    fn test_validate_rejects_unknown_rule_indicator() {
        let mut plan = ScreenPlan::default();
        plan.screens[0].rules = Rule::compare(
            Operand::ind("bollinger_upper"),
            Comparison::GreaterThan,
            Operand::lit(0.0),
        );

        let err = plan.validate().unwrap_err();
        assert!(err.to_string().contains("bollinger_upper"));
    }

    #[test]
    fn test_validate_rejects_zero_lookback() {
        let mut plan = ScreenPlan::default();
        plan.screens[0].lookback = 0;
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_serde_round_trip() {
        let plan = ScreenPlan::default();
        let json = serde_json::to_string_pretty(&plan).unwrap();
        let parsed: ScreenPlan = serde_json::from_str(&json).unwrap();

        assert!(parsed.validate().is_ok());
        assert_eq!(parsed.screens.len(), plan.screens.len());
        assert_eq!(parsed.column_names(), plan.column_names());
    }

    #[test]
    fn test_load_from_file() {
        let json = r#"{
            "screens": [
                {
                    "timeframe": "1H",
                    "lookback": 80,
                    "indicators": { "ma_periods": [10, 30], "rsi_period": null, "macd": null,
                                    "volume_ratio_window": null, "ma_deviation_period": null },
                    "rules": { "type": "compare", "lhs": "ma10", "op": "GreaterThan", "rhs": "ma30" }
                }
            ]
        }"#;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let plan = ScreenPlan::load_from(file.path()).unwrap();
        assert!(plan.validate().is_ok());
        assert_eq!(plan.screens.len(), 1);
        assert_eq!(plan.screens[0].lookback, 80);
        assert!(plan.screens[0].freshness_check); // default fills in
        assert_eq!(
            plan.column_names(),
            vec!["1H_close", "1H_volume", "1H_ma10", "1H_ma30", "1H_vol_ma5", "1H_vol_ma10"]
        );
    }

    #[test]
    fn test_load_from_missing_file_fails() {
        let err = ScreenPlan::load_from(Path::new("/nonexistent/plan.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read"));
    }
}
