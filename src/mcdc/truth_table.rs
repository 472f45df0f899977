//! Truth table generation
//!
//! Rows are produced in binary counting order with `C1` as the most
//! significant bit, `false` before `true`. This is the only exponential step
//! in the crate; callers bound `n` before getting here.

use super::evaluate::DecisionEvaluator;
use super::types::{Condition, TruthTableRow};
use std::collections::BTreeMap;

/// Enumerate all `2^n` assignments and evaluate each one
///
/// Returns an empty table when `2^n` does not fit in `usize`.
pub fn generate_truth_table(
    conditions: &[Condition],
    evaluator: &DecisionEvaluator,
) -> Vec<TruthTableRow> {
    let n = conditions.len();
    let Some(total) = u32::try_from(n).ok().and_then(|bits| 1usize.checked_shl(bits)) else {
        return vec![];
    };

    (0..total)
        .map(|combo| {
            let condition_values: BTreeMap<String, bool> = conditions
                .iter()
                .enumerate()
                .map(|(k, c)| (c.id.clone(), (combo >> (n - 1 - k)) & 1 == 1))
                .collect();
            let evaluation = evaluator.evaluate(&condition_values);
            TruthTableRow {
                condition_values,
                decision_outcome: evaluation.outcome,
                row_index: combo + 1,
                evaluation_failed: evaluation.failed,
            }
        })
        .collect()
}
