//! Decision evaluation
//!
//! Evaluation never panics and never propagates: a row that cannot be
//! evaluated gets outcome `false` and is flagged so the caller can count it.

use super::expr::{Expr, ExprError};
use super::types::Decision;
use std::collections::BTreeMap;

/// Outcome of evaluating one assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub outcome: bool,
    pub failed: bool,
}

/// Evaluates a decision for arbitrary condition assignments
#[derive(Debug, Clone)]
pub struct DecisionEvaluator {
    bound: Result<Expr, ExprError>,
}

impl DecisionEvaluator {
    /// Parse the normalized expression once and bind its leaves to condition ids
    pub fn new(decision: &Decision) -> Self {
        let bound = Expr::parse(&decision.normalized_expression)
            .and_then(|expr| expr.bind(&decision.conditions));
        Self { bound }
    }

    /// Why every evaluation will fail, if it will
    pub fn setup_error(&self) -> Option<&ExprError> {
        self.bound.as_ref().err()
    }

    pub fn try_evaluate(&self, values: &BTreeMap<String, bool>) -> Result<bool, ExprError> {
        match &self.bound {
            Ok(expr) => expr.evaluate(values),
            Err(e) => Err(e.clone()),
        }
    }

    /// Evaluate, defaulting the outcome to `false` on failure
    pub fn evaluate(&self, values: &BTreeMap<String, bool>) -> Evaluation {
        match self.try_evaluate(values) {
            Ok(outcome) => Evaluation {
                outcome,
                failed: false,
            },
            Err(_) => Evaluation {
                outcome: false,
                failed: true,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcdc::conditions::{extract_conditions, ExtractionMode};
    use crate::mcdc::normalize::normalize_expression;

    fn decision(raw: &str) -> Decision {
        let normalized = normalize_expression(raw);
        let conditions = extract_conditions(&normalized, ExtractionMode::Flat).conditions;
        Decision {
            id: "f:1".into(),
            file_path: "f".into(),
            line_number: 1,
            full_expression: raw.into(),
            normalized_expression: normalized,
            conditions,
            operators: Default::default(),
            complexity: 0,
        }
    }

    fn values(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_substring_conditions_do_not_collide() {
        // "a" is a substring of "ab"; text substitution would corrupt "ab"
        let d = decision("ab && a");
        let evaluator = DecisionEvaluator::new(&d);
        assert!(evaluator.setup_error().is_none());
        let e = evaluator.evaluate(&values(&[("C1", true), ("C2", false)]));
        assert_eq!(e, Evaluation { outcome: false, failed: false });
        let e = evaluator.evaluate(&values(&[("C1", true), ("C2", true)]));
        assert!(e.outcome);
    }

    #[test]
    fn test_flat_split_of_call_fails_safe() {
        let d = decision("f(a && b) || c");
        let evaluator = DecisionEvaluator::new(&d);
        assert!(evaluator.setup_error().is_some());
        let e = evaluator.evaluate(&values(&[("C1", true), ("C2", true), ("C3", true)]));
        assert_eq!(e, Evaluation { outcome: false, failed: true });
    }

    #[test]
    fn test_unbalanced_expression_fails_safe() {
        let d = decision("(a && b");
        let evaluator = DecisionEvaluator::new(&d);
        let e = evaluator.evaluate(&values(&[("C1", true), ("C2", true)]));
        assert!(e.failed);
        assert!(!e.outcome);
    }
}
