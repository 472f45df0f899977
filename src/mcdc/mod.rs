//! MC/DC analysis for boolean decisions
//!
//! Pipeline for one decision:
//!
//! ```text
//! raw expression ─► normalize ─► extract conditions ─► truth table ─► select pairs ─► McdcResult
//!                                      │                    ▲
//!                                      └─► expression tree ─┘ (evaluator)
//! ```
//!
//! ## Submodules
//!
//! - `normalize` - operator dialects → `AND`/`OR`/`NOT`
//! - `conditions` - flat or structured condition extraction
//! - `expr` - expression tree parser and evaluator
//! - `truth_table` - `2^n` enumeration
//! - `select` - independence-pair selection
//!
//! ## Example
//!
//! ```
//! use mcdc_gate::mcdc::analyze_decision;
//!
//! let result = analyze_decision("a && b", "src/lib.rs", 10);
//! assert!(result.is_achievable);
//! assert_eq!(result.truth_table.len(), 4);
//! assert_eq!(result.minimum_test_count, 3);
//! ```

mod conditions;
mod evaluate;
mod expr;
mod normalize;
mod select;
mod truth_table;
mod types;

pub use conditions::{extract_conditions, ExtractionMode, Extraction};
pub use evaluate::{DecisionEvaluator, Evaluation};
pub use expr::{Expr, ExprError};
pub use normalize::normalize_expression;
pub use select::{select_test_cases, Selection};
pub use truth_table::generate_truth_table;
pub use types::{
    Condition, Decision, IndependencePair, McdcResult, McdcTestCase, Operator, TruthTableRow,
};

use crate::config::CoverageConfig;
use crate::config_validate::MAX_CONDITIONS_CAP;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Default bound on conditions per decision (256 truth-table rows)
pub const DEFAULT_MAX_CONDITIONS: usize = 8;

/// Knobs for MC/DC analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct McdcOptions {
    #[serde(default = "default_max_conditions")]
    pub max_conditions: usize,

    #[serde(default)]
    pub extraction: ExtractionMode,

    /// Only the complexity guard marks a decision non-achievable; unpaired
    /// conditions are reported but do not flip `is_achievable`
    #[serde(default)]
    pub legacy_achievability: bool,
}

fn default_max_conditions() -> usize {
    DEFAULT_MAX_CONDITIONS
}

impl Default for McdcOptions {
    fn default() -> Self {
        Self {
            max_conditions: DEFAULT_MAX_CONDITIONS,
            extraction: ExtractionMode::Flat,
            legacy_achievability: false,
        }
    }
}

impl From<&CoverageConfig> for McdcOptions {
    fn from(config: &CoverageConfig) -> Self {
        Self {
            max_conditions: config.mcdc_max_conditions,
            ..Self::default()
        }
    }
}

/// Analyze one decision with default options
pub fn analyze_decision(expression: &str, file_path: &str, line_number: usize) -> McdcResult {
    McdcAnalyzer::new().analyze(expression, file_path, line_number)
}

/// MC/DC analyzer
///
/// Stateless apart from a memo of results keyed by decision id. Safe to
/// share by reference across visitors and threads.
#[derive(Debug, Default)]
pub struct McdcAnalyzer {
    options: McdcOptions,
    cache: RwLock<HashMap<String, Arc<McdcResult>>>,
}

impl McdcAnalyzer {
    pub fn new() -> Self {
        Self::with_options(McdcOptions::default())
    }

    pub fn with_options(options: McdcOptions) -> Self {
        Self {
            options,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn options(&self) -> &McdcOptions {
        &self.options
    }

    /// Analyze a decision, returning an owned result
    pub fn analyze(&self, expression: &str, file_path: &str, line_number: usize) -> McdcResult {
        self.analyze_cached(expression, file_path, line_number)
            .as_ref()
            .clone()
    }

    /// Analyze a decision, reusing a memoized result when the same
    /// expression was already analyzed at the same location
    pub fn analyze_cached(
        &self,
        expression: &str,
        file_path: &str,
        line_number: usize,
    ) -> Arc<McdcResult> {
        let decision_id = format!("{}:{}", file_path, line_number);
        let normalized = normalize_expression(expression);
        let hash = self.expression_hash(&normalized);

        if let Ok(cache) = self.cache.read() {
            if let Some(hit) = cache.get(&decision_id) {
                if hit.expression_hash == hash && hit.decision.full_expression == expression {
                    debug!(decision = %decision_id, "MC/DC cache hit");
                    return Arc::clone(hit);
                }
            }
        }

        let result = Arc::new(self.compute(expression, normalized, hash, file_path, line_number));
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(decision_id, Arc::clone(&result));
        }
        result
    }

    /// Previously computed result for `file_path:line_number`, if any
    pub fn cached_result(&self, decision_id: &str) -> Option<Arc<McdcResult>> {
        self.cache
            .read()
            .ok()
            .and_then(|cache| cache.get(decision_id).cloned())
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.write() {
            cache.clear();
        }
    }

    fn expression_hash(&self, normalized: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update(format!("{:?}", self.options).as_bytes());
        format!("sha256:{}", hex::encode(&hasher.finalize()[..8]))
    }

    fn compute(
        &self,
        expression: &str,
        normalized: String,
        expression_hash: String,
        file_path: &str,
        line_number: usize,
    ) -> McdcResult {
        let extraction = extract_conditions(&normalized, self.options.extraction);
        let mut warnings = extraction.warnings;
        let conditions = extraction.conditions;

        let operators: BTreeSet<Operator> = [Operator::And, Operator::Or, Operator::Not]
            .into_iter()
            .filter(|op| normalize::has_token(&normalized, op.token()))
            .collect();

        let decision = Decision {
            id: format!("{}:{}", file_path, line_number),
            file_path: file_path.to_string(),
            line_number,
            full_expression: expression.to_string(),
            normalized_expression: normalized,
            complexity: conditions.len() + operators.len(),
            conditions,
            operators,
        };

        for w in &warnings {
            warn!(decision = %decision.id, "{}", w);
        }

        let n = decision.conditions.len();
        let limit = self.options.max_conditions.min(MAX_CONDITIONS_CAP);
        if n > limit {
            let reason = format!(
                "Decision has {} conditions, exceeding the configured maximum of {}",
                n, limit
            );
            warn!(decision = %decision.id, "{}", reason);
            return McdcResult {
                condition_achievability: decision
                    .conditions
                    .iter()
                    .map(|c| (c.id.clone(), false))
                    .collect(),
                decision,
                truth_table: vec![],
                required_test_cases: vec![],
                minimum_test_count: 0,
                is_achievable: false,
                reason: Some(reason),
                independence_pairs: vec![],
                warnings,
                failed_evaluations: 0,
                expression_hash,
            };
        }

        if n == 0 {
            warnings.push("no conditions could be extracted".to_string());
            return McdcResult {
                decision,
                truth_table: vec![],
                required_test_cases: vec![],
                minimum_test_count: 0,
                is_achievable: false,
                reason: Some("Decision has no conditions".to_string()),
                condition_achievability: BTreeMap::new(),
                independence_pairs: vec![],
                warnings,
                failed_evaluations: 0,
                expression_hash,
            };
        }

        let evaluator = DecisionEvaluator::new(&decision);
        if let Some(e) = evaluator.setup_error() {
            let message = format!("expression could not be evaluated: {}", e);
            warn!(decision = %decision.id, "{}", message);
            warnings.push(message);
        }

        let truth_table = generate_truth_table(&decision.conditions, &evaluator);
        let failed_evaluations = truth_table.iter().filter(|r| r.evaluation_failed).count();
        if failed_evaluations > 0 {
            let message = format!(
                "{} of {} truth-table rows failed evaluation and defaulted to false",
                failed_evaluations,
                truth_table.len()
            );
            warn!(decision = %decision.id, "{}", message);
            warnings.push(message);
        }

        let selection = select_test_cases(&decision.conditions, &truth_table);
        let unpaired: Vec<&str> = decision
            .conditions
            .iter()
            .filter(|c| selection.achievability.get(&c.id) == Some(&false))
            .map(|c| c.id.as_str())
            .collect();

        let (is_achievable, reason) = if unpaired.is_empty() {
            (true, None)
        } else {
            let message = format!(
                "No independence pair for condition(s): {}",
                unpaired.join(", ")
            );
            if self.options.legacy_achievability {
                warnings.push(message);
                (true, None)
            } else {
                (false, Some(message))
            }
        };

        debug!(
            decision = %decision.id,
            conditions = n,
            tests = selection.test_cases.len(),
            achievable = is_achievable,
            "MC/DC analysis complete"
        );

        McdcResult {
            minimum_test_count: selection.test_cases.len(),
            required_test_cases: selection.test_cases,
            independence_pairs: selection.pairs,
            condition_achievability: selection.achievability,
            decision,
            truth_table,
            is_achievable,
            reason,
            warnings,
            failed_evaluations,
            expression_hash,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_two_condition_and() {
        let result = analyze_decision("A and B", "src/x.py", 3);
        assert_eq!(result.decision.id, "src/x.py:3");
        assert_eq!(result.decision.conditions.len(), 2);
        assert_eq!(result.truth_table.len(), 4);
        assert!(result.is_achievable);
        assert!((2..=4).contains(&result.minimum_test_count));
        assert_eq!(result.decision.operators, BTreeSet::from([Operator::And]));
        assert_eq!(result.decision.complexity, 3);
    }

    #[test]
    fn test_complexity_guard() {
        let expr = (1..=9)
            .map(|i| format!("c{}", i))
            .collect::<Vec<_>>()
            .join(" and ");
        let result = analyze_decision(&expr, "f.py", 1);
        assert!(!result.is_achievable);
        assert_eq!(result.minimum_test_count, 0);
        assert!(result.truth_table.is_empty());
        let reason = result.reason.unwrap();
        assert!(reason.contains('9'));
        assert!(reason.contains('8'));
    }

    #[test]
    fn test_unpaired_condition_reported() {
        // Flat split breaks the call apart, so no row can be evaluated
        let result = analyze_decision("f(a && b) || c", "f.rs", 1);
        assert!(!result.is_achievable);
        assert_eq!(result.unpaired_conditions(), vec!["C1", "C2", "C3"]);
        assert!(result.reason.unwrap().contains("C3"));
        assert_eq!(result.minimum_test_count, 0);
    }

    #[test]
    fn test_max_conditions_clamped_to_cap() {
        let analyzer = McdcAnalyzer::with_options(McdcOptions {
            max_conditions: 64,
            ..McdcOptions::default()
        });
        let expr = (1..=64)
            .map(|i| format!("c{}", i))
            .collect::<Vec<_>>()
            .join(" || ");
        let result = analyzer.analyze(&expr, "f.rs", 1);
        assert_eq!(result.decision.conditions.len(), 64);
        assert!(!result.is_achievable);
        assert!(result.truth_table.is_empty());
        assert!(result.reason.unwrap().contains("maximum of 16"));
    }

    #[test]
    fn test_unpaired_conditions_in_condition_order() {
        let analyzer = McdcAnalyzer::with_options(McdcOptions {
            max_conditions: 12,
            ..McdcOptions::default()
        });
        let result = analyzer.analyze("f(a && b) || c || d || e || g || h || i || j || k", "f.rs", 1);
        assert_eq!(result.decision.conditions.len(), 10);
        let expected = vec!["C1", "C2", "C3", "C4", "C5", "C6", "C7", "C8", "C9", "C10"];
        assert_eq!(result.unpaired_conditions(), expected);
        assert_eq!(
            result.reason.unwrap(),
            format!("No independence pair for condition(s): {}", expected.join(", "))
        );
    }

    #[test]
    fn test_structured_mode_handles_calls() {
        let analyzer = McdcAnalyzer::with_options(McdcOptions {
            extraction: ExtractionMode::Structured,
            ..McdcOptions::default()
        });
        let result = analyzer.analyze("f(a && b) || c", "f.rs", 1);
        assert_eq!(result.decision.conditions.len(), 2);
        assert_eq!(result.failed_evaluations, 0);
        assert!(result.is_achievable);
    }

    #[test]
    fn test_duplicate_conditions_analyzed_separately() {
        let result = analyze_decision("a || a && b", "f.rs", 1);
        assert_eq!(result.decision.conditions.len(), 3);
        assert_eq!(result.truth_table.len(), 8);
        assert!(result.is_achievable);
    }

    #[test]
    fn test_legacy_achievability_keeps_flag() {
        let analyzer = McdcAnalyzer::with_options(McdcOptions {
            legacy_achievability: true,
            ..McdcOptions::default()
        });
        let result = analyzer.analyze("f(a && b) || c", "f.rs", 1);
        assert!(result.is_achievable);
        assert!(result.reason.is_none());
        assert!(!result.condition_achievability["C3"]);
        assert!(result.warnings.iter().any(|w| w.contains("C3")));
    }

    #[test]
    fn test_failed_rows_counted() {
        let result = analyze_decision("(a && b", "f.rs", 1);
        assert_eq!(result.failed_evaluations, 4);
        assert!(!result.warnings.is_empty());
        assert!(result.truth_table.iter().all(|r| !r.decision_outcome));
    }

    #[test]
    fn test_cache_hit_and_invalidation() {
        let analyzer = McdcAnalyzer::new();
        let first = analyzer.analyze_cached("a && b", "f.rs", 7);
        let second = analyzer.analyze_cached("a && b", "f.rs", 7);
        assert!(Arc::ptr_eq(&first, &second));

        let changed = analyzer.analyze_cached("a || b", "f.rs", 7);
        assert!(!Arc::ptr_eq(&first, &changed));
        assert_eq!(
            analyzer.cached_result("f.rs:7").unwrap().decision.full_expression,
            "a || b"
        );
        assert!(analyzer.cached_result("f.rs:8").is_none());
    }

    #[test]
    fn test_empty_expression() {
        let result = analyze_decision("   ", "f.rs", 1);
        assert!(!result.is_achievable);
        assert!(result.decision.conditions.is_empty());
    }
}
