//! Composable screening rules.
//!
//! A screen predicate is a tree of comparison leaves and boolean
//! combinators, deserializable from configuration:
//!
//! ```json
//! {
//!   "type": "all",
//!   "rules": [
//!     { "type": "compare", "lhs": "ma10", "op": "GreaterThan", "rhs": "ma20" },
//!     { "type": "compare", "lhs": "rsi7", "op": "LessThan", "rhs": 70.0 }
//!   ]
//! }
//! ```
//!
//! Operands name indicators or carry literal thresholds. Missing operands
//! make a comparison false; callers that need "undefined indicator fails
//! the symbol" must check `required_indicators` against the mapping first,
//! since a missing operand under `not` would otherwise read as a pass.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// ============================================================================
// Comparison Operators
// ============================================================================

/// Comparison operator for rule leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Comparison {
    GreaterThan,
    GreaterEqual,
    LessThan,
    LessEqual,
}

impl Comparison {
    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Comparison::GreaterThan => lhs > rhs,
            Comparison::GreaterEqual => lhs >= rhs,
            Comparison::LessThan => lhs < rhs,
            Comparison::LessEqual => lhs <= rhs,
        }
    }
}

// ============================================================================
// Operands
// ============================================================================

/// One side of a comparison: an indicator name or a literal number.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    Literal(f64),
    Indicator(String),
}

impl Operand {
    /// Shorthand for an indicator reference.
    pub fn ind(name: impl Into<String>) -> Self {
        Self::Indicator(name.into())
    }

    /// Shorthand for a literal threshold.
    pub fn lit(value: f64) -> Self {
        Self::Literal(value)
    }

    fn resolve(&self, values: &BTreeMap<String, f64>) -> Option<f64> {
        match self {
            Self::Literal(value) => Some(*value),
            Self::Indicator(name) => values.get(name).copied(),
        }
    }
}

// ============================================================================
// Rule Tree
// ============================================================================

/// A node in a screening predicate tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Rule {
    /// Compare two operands
    Compare {
        lhs: Operand,
        op: Comparison,
        rhs: Operand,
    },
    /// Every child rule must pass
    All { rules: Vec<Rule> },
    /// At least one child rule must pass
    Any { rules: Vec<Rule> },
    /// Invert a child rule
    Not { rule: Box<Rule> },
}

impl Rule {
    /// Comparison leaf between two operands.
    pub fn compare(lhs: Operand, op: Comparison, rhs: Operand) -> Self {
        Self::Compare { lhs, op, rhs }
    }

    /// Conjunction of child rules.
    pub fn all(rules: Vec<Rule>) -> Self {
        Self::All { rules }
    }

    /// Disjunction of child rules.
    pub fn any(rules: Vec<Rule>) -> Self {
        Self::Any { rules }
    }

    /// Negation of a child rule.
    pub fn not(rule: Rule) -> Self {
        Self::Not { rule: Box::new(rule) }
    }

    /// Every indicator name referenced anywhere in the tree.
    pub fn required_indicators(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        self.collect_indicators(&mut names);
        names
    }

    fn collect_indicators(&self, names: &mut BTreeSet<String>) {
        match self {
            Self::Compare { lhs, rhs, .. } => {
                if let Operand::Indicator(name) = lhs {
                    names.insert(name.clone());
                }
                if let Operand::Indicator(name) = rhs {
                    names.insert(name.clone());
                }
            }
            Self::All { rules } | Self::Any { rules } => {
                for rule in rules {
                    rule.collect_indicators(names);
                }
            }
            Self::Not { rule } => rule.collect_indicators(names),
        }
    }

    /// Evaluate the tree against an indicator mapping.
    pub fn evaluate(&self, values: &BTreeMap<String, f64>) -> bool {
        match self {
            Self::Compare { lhs, op, rhs } => match (lhs.resolve(values), rhs.resolve(values)) {
                (Some(l), Some(r)) => op.apply(l, r),
                _ => false,
            },
            Self::All { rules } => rules.iter().all(|rule| rule.evaluate(values)),
            Self::Any { rules } => rules.iter().any(|rule| rule.evaluate(values)),
            Self::Not { rule } => !rule.evaluate(values),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), *value))
            .collect()
    }

    #[test]
    fn test_comparison_operators() {
        let v = values(&[("a", 2.0), ("b", 1.0)]);

        assert!(Rule::compare(Operand::ind("a"), Comparison::GreaterThan, Operand::ind("b")).evaluate(&v));
        assert!(Rule::compare(Operand::ind("a"), Comparison::GreaterEqual, Operand::lit(2.0)).evaluate(&v));
        assert!(Rule::compare(Operand::ind("b"), Comparison::LessThan, Operand::lit(1.5)).evaluate(&v));
        assert!(Rule::compare(Operand::ind("b"), Comparison::LessEqual, Operand::lit(1.0)).evaluate(&v));
        assert!(!Rule::compare(Operand::ind("b"), Comparison::GreaterThan, Operand::ind("a")).evaluate(&v));
    }

    #[test]
    fn test_all_and_any_combinators() {
        let v = values(&[("x", 5.0)]);
        let above = Rule::compare(Operand::ind("x"), Comparison::GreaterThan, Operand::lit(1.0));
        let below = Rule::compare(Operand::ind("x"), Comparison::LessThan, Operand::lit(1.0));

        assert!(Rule::all(vec![above.clone(), above.clone()]).evaluate(&v));
        assert!(!Rule::all(vec![above.clone(), below.clone()]).evaluate(&v));
        assert!(Rule::any(vec![below.clone(), above.clone()]).evaluate(&v));
        assert!(!Rule::any(vec![below.clone(), below]).evaluate(&v));
        // Empty conjunction is vacuously true, empty disjunction false
        assert!(Rule::all(vec![]).evaluate(&v));
        assert!(!Rule::any(vec![]).evaluate(&v));
    }

    #[test]
    fn test_not_inverts() {
        let v = values(&[("x", 5.0)]);
        let above = Rule::compare(Operand::ind("x"), Comparison::GreaterThan, Operand::lit(1.0));

        assert!(!Rule::not(above.clone()).evaluate(&v));
        assert!(Rule::not(Rule::not(above)).evaluate(&v));
    }

    #[test]
    fn test_missing_operand_fails_comparison() {
        let v = values(&[("x", 5.0)]);
        let rule = Rule::compare(Operand::ind("missing"), Comparison::GreaterThan, Operand::lit(0.0));

        assert!(!rule.evaluate(&v));
        // This is why callers must pre-check required_indicators: a missing
        // operand under `not` reads as a pass
        assert!(Rule::not(rule).evaluate(&v));
    }

    #[test]
    fn test_required_indicators_walks_whole_tree() {
        let rule = Rule::all(vec![
            Rule::compare(Operand::ind("ma10"), Comparison::GreaterThan, Operand::ind("ma20")),
            Rule::any(vec![Rule::compare(
                Operand::ind("rsi7"),
                Comparison::LessThan,
                Operand::lit(70.0),
            )]),
            Rule::not(Rule::compare(
                Operand::ind("macd_hist"),
                Comparison::LessEqual,
                Operand::lit(0.0),
            )),
        ]);

        let names = rule.required_indicators();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["ma10", "ma20", "macd_hist", "rsi7"]
        );
    }

    #[test]
    fn test_deserializes_from_config_json() {
        let json = r#"{
            "type": "all",
            "rules": [
                { "type": "compare", "lhs": "ma10", "op": "GreaterThan", "rhs": "ma20" },
                { "type": "compare", "lhs": "rsi7", "op": "LessThan", "rhs": 70.0 },
                { "type": "not", "rule": { "type": "compare", "lhs": "close", "op": "LessEqual", "rhs": "ma20" } }
            ]
        }"#;

        let rule: Rule = serde_json::from_str(json).unwrap();

        let passing = values(&[("ma10", 11.0), ("ma20", 10.0), ("rsi7", 55.0), ("close", 10.5)]);
        assert!(rule.evaluate(&passing));

        let failing = values(&[("ma10", 9.0), ("ma20", 10.0), ("rsi7", 55.0), ("close", 10.5)]);
        assert!(!rule.evaluate(&failing));
    }

    #[test]
    fn test_serde_round_trip_preserves_semantics() {
        let rule = Rule::all(vec![
            Rule::compare(Operand::ind("vol_ma5"), Comparison::GreaterThan, Operand::ind("vol_ma10")),
            Rule::not(Rule::compare(Operand::ind("rsi7"), Comparison::GreaterEqual, Operand::lit(70.0))),
        ]);

        let json = serde_json::to_string(&rule).unwrap();
        let round_tripped: Rule = serde_json::from_str(&json).unwrap();

        let v = values(&[("vol_ma5", 3.0), ("vol_ma10", 2.0), ("rsi7", 50.0)]);
        assert_eq!(rule.evaluate(&v), round_tripped.evaluate(&v));
        assert_eq!(rule.required_indicators(), round_tripped.required_indicators());
    }

    #[test]
    fn test_literal_operand_serializes_as_number() {
        let rule = Rule::compare(Operand::ind("rsi7"), Comparison::GreaterThan, Operand::lit(40.0));
        let json = serde_json::to_string(&rule).unwrap();

        assert!(json.contains("\"rhs\":40.0"));
        assert!(json.contains("\"lhs\":\"rsi7\""));
        assert!(json.contains("\"op\":\"GreaterThan\""));
    }
}
