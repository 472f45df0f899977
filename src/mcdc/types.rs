//! Value types produced by MC/DC analysis
//!
//! All of these are built once and never mutated, so they can be cached
//! and shared across threads freely.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Boolean operator appearing in a decision
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operator {
    And,
    Or,
    Not,
}

impl Operator {
    /// Canonical token in a normalized expression
    pub fn token(&self) -> &'static str {
        match self {
            Operator::And => "AND",
            Operator::Or => "OR",
            Operator::Not => "NOT",
        }
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// An atomic condition inside a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Condition {
    /// `C1..Cn`, in left-to-right order of appearance
    pub id: String,
    pub expression: String,
    /// First identifier-like token in the expression, if any
    pub variable_name: Option<String>,
}

/// A complete boolean expression controlling a branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Decision {
    /// `file_path:line_number`
    pub id: String,
    pub file_path: String,
    pub line_number: usize,
    /// Expression as supplied by the caller
    pub full_expression: String,
    /// Expression rewritten to `AND`/`OR`/`NOT` tokens
    pub normalized_expression: String,
    pub conditions: Vec<Condition>,
    pub operators: BTreeSet<Operator>,
    /// `|conditions| + |operators|`
    pub complexity: usize,
}

impl Decision {
    pub fn condition_ids(&self) -> Vec<&str> {
        self.conditions.iter().map(|c| c.id.as_str()).collect()
    }
}

/// One assignment of values to every condition, plus the outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TruthTableRow {
    pub condition_values: BTreeMap<String, bool>,
    pub decision_outcome: bool,
    /// 1-based, binary counting order with C1 as the most significant bit
    pub row_index: usize,
    /// The outcome defaulted to `false` because evaluation failed
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub evaluation_failed: bool,
}

impl TruthTableRow {
    /// Test-case id derived from the row index
    pub fn test_id(&self) -> String {
        format!("T{}", self.row_index)
    }
}

/// A truth-table row selected as MC/DC evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct McdcTestCase {
    pub test_id: String,
    pub condition_values: BTreeMap<String, bool>,
    pub expected_outcome: bool,
    /// Condition this row was first selected for
    pub independent_condition: String,
    pub paired_with: Option<String>,
}

/// The pair of rows showing one condition's independent effect
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IndependencePair {
    pub condition_id: String,
    pub first_test_id: String,
    pub second_test_id: String,
}

/// Full MC/DC analysis of one decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct McdcResult {
    pub decision: Decision,
    pub truth_table: Vec<TruthTableRow>,
    /// Deduplicated by `test_id`
    pub required_test_cases: Vec<McdcTestCase>,
    pub minimum_test_count: usize,
    pub is_achievable: bool,
    pub reason: Option<String>,
    /// Whether an independence pair was found, per condition id
    pub condition_achievability: BTreeMap<String, bool>,
    pub independence_pairs: Vec<IndependencePair>,
    /// Parse and evaluation problems (never fatal)
    pub warnings: Vec<String>,
    /// Truth-table rows whose outcome defaulted to `false`
    pub failed_evaluations: usize,
    pub expression_hash: String,
}

impl McdcResult {
    /// Conditions without an independence pair, in condition order
    pub fn unpaired_conditions(&self) -> Vec<&str> {
        self.decision
            .conditions
            .iter()
            .filter(|c| self.condition_achievability.get(&c.id) == Some(&false))
            .map(|c| c.id.as_str())
            .collect()
    }

    pub fn test_case(&self, test_id: &str) -> Option<&McdcTestCase> {
        self.required_test_cases
            .iter()
            .find(|t| t.test_id == test_id)
    }

    /// Format as human-readable report
    pub fn to_report(&self) -> String {
        let mut out = String::new();
        let d = &self.decision;

        out.push_str(&format!("Decision {}\n", d.id));
        out.push_str(&format!("  Expression: {}\n", d.full_expression));
        out.push_str(&format!("  Normalized: {}\n", d.normalized_expression));
        out.push_str(&format!(
            "  Complexity: {} ({} conditions)\n",
            d.complexity,
            d.conditions.len()
        ));

        out.push_str("\nConditions:\n");
        for c in &d.conditions {
            let mark = match self.condition_achievability.get(&c.id) {
                Some(true) => "✓",
                _ => "✗",
            };
            out.push_str(&format!("  {} {}: {}\n", mark, c.id, c.expression));
        }

        if !self.truth_table.is_empty() {
            out.push_str("\nTruth table:\n");
            let header: Vec<&str> = d.conditions.iter().map(|c| c.id.as_str()).collect();
            out.push_str(&format!("  {:>5} | {} | out\n", "row", header.join(" ")));
            for row in &self.truth_table {
                let cells: Vec<String> = d
                    .conditions
                    .iter()
                    .map(|c| {
                        let v = row.condition_values.get(&c.id).copied().unwrap_or(false);
                        format!("{:>width$}", if v { "T" } else { "F" }, width = c.id.len())
                    })
                    .collect();
                let flag = if row.evaluation_failed { " !" } else { "" };
                out.push_str(&format!(
                    "  {:>5} | {} | {}{}\n",
                    row.test_id(),
                    cells.join(" "),
                    if row.decision_outcome { "T" } else { "F" },
                    flag
                ));
            }
        }

        let status = if self.is_achievable {
            "✓ ACHIEVABLE"
        } else {
            "✗ NOT ACHIEVABLE"
        };
        out.push_str(&format!(
            "\nMC/DC: {} ({} tests required)\n",
            status, self.minimum_test_count
        ));
        if let Some(reason) = &self.reason {
            out.push_str(&format!("  Reason: {}\n", reason));
        }
        for pair in &self.independence_pairs {
            out.push_str(&format!(
                "  {}: {} ↔ {}\n",
                pair.condition_id, pair.first_test_id, pair.second_test_id
            ));
        }
        for warning in &self.warnings {
            out.push_str(&format!("  ⚠ {}\n", warning));
        }

        out
    }
}
