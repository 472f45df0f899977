//! Independence-pair selection
//!
//! For each condition, the first pair of rows (outer loop ascending, inner
//! loop over later rows ascending) that differs in exactly that condition and
//! in outcome is chosen. Rows are then deduplicated by test id, keeping the
//! first condition each row was selected for.

use super::types::{Condition, IndependencePair, McdcTestCase, TruthTableRow};
use std::collections::{BTreeMap, HashSet};

/// Selected evidence for one decision
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    pub test_cases: Vec<McdcTestCase>,
    pub pairs: Vec<IndependencePair>,
    pub achievability: BTreeMap<String, bool>,
}

/// Select the minimal deduplicated MC/DC test set
pub fn select_test_cases(conditions: &[Condition], rows: &[TruthTableRow]) -> Selection {
    let mut candidates = Vec::new();
    let mut pairs = Vec::new();
    let mut achievability = BTreeMap::new();

    for condition in conditions {
        match find_pair(&condition.id, rows) {
            Some((r1, r2)) => {
                candidates.push(test_case(r1, &condition.id, r2));
                candidates.push(test_case(r2, &condition.id, r1));
                pairs.push(IndependencePair {
                    condition_id: condition.id.clone(),
                    first_test_id: r1.test_id(),
                    second_test_id: r2.test_id(),
                });
                achievability.insert(condition.id.clone(), true);
            }
            None => {
                achievability.insert(condition.id.clone(), false);
            }
        }
    }

    let mut seen = HashSet::new();
    let test_cases = candidates
        .into_iter()
        .filter(|t| seen.insert(t.test_id.clone()))
        .collect();

    Selection {
        test_cases,
        pairs,
        achievability,
    }
}

fn find_pair<'a>(
    condition_id: &str,
    rows: &'a [TruthTableRow],
) -> Option<(&'a TruthTableRow, &'a TruthTableRow)> {
    for (i, r1) in rows.iter().enumerate() {
        for r2 in &rows[i + 1..] {
            if r1.decision_outcome != r2.decision_outcome
                && differs_only_in(r1, r2, condition_id)
            {
                return Some((r1, r2));
            }
        }
    }
    None
}

fn differs_only_in(r1: &TruthTableRow, r2: &TruthTableRow, condition_id: &str) -> bool {
    let mut differing = r1
        .condition_values
        .iter()
        .filter(|(id, v)| r2.condition_values.get(*id) != Some(*v));
    matches!(
        (differing.next(), differing.next()),
        (Some((id, _)), None) if id == condition_id
    )
}

fn test_case(row: &TruthTableRow, condition_id: &str, partner: &TruthTableRow) -> McdcTestCase {
    McdcTestCase {
        test_id: row.test_id(),
        condition_values: row.condition_values.clone(),
        expected_outcome: row.decision_outcome,
        independent_condition: condition_id.to_string(),
        paired_with: Some(partner.test_id()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, values: &[bool], outcome: bool) -> TruthTableRow {
        TruthTableRow {
            condition_values: values
                .iter()
                .enumerate()
                .map(|(i, v)| (format!("C{}", i + 1), *v))
                .collect(),
            decision_outcome: outcome,
            row_index: index,
            evaluation_failed: false,
        }
    }

    fn conditions(n: usize) -> Vec<Condition> {
        (1..=n)
            .map(|i| Condition {
                id: format!("C{}", i),
                expression: format!("x{}", i),
                variable_name: None,
            })
            .collect()
    }

    #[test]
    fn test_and_selects_three_rows() {
        // a AND b
        let rows = vec![
            row(1, &[false, false], false),
            row(2, &[false, true], false),
            row(3, &[true, false], false),
            row(4, &[true, true], true),
        ];
        let selection = select_test_cases(&conditions(2), &rows);

        assert_eq!(selection.pairs[0].first_test_id, "T2");
        assert_eq!(selection.pairs[0].second_test_id, "T4");
        assert_eq!(selection.pairs[1].first_test_id, "T3");
        assert_eq!(selection.pairs[1].second_test_id, "T4");

        let ids: Vec<&str> = selection.test_cases.iter().map(|t| t.test_id.as_str()).collect();
        assert_eq!(ids, vec!["T2", "T4", "T3"]);
        assert_eq!(selection.test_cases[1].independent_condition, "C1");
    }

    #[test]
    fn test_masked_condition_is_unpaired() {
        // a OR (a AND b): b never changes the outcome
        let rows = vec![
            row(1, &[false, false], false),
            row(2, &[false, true], false),
            row(3, &[true, false], true),
            row(4, &[true, true], true),
        ];
        let selection = select_test_cases(&conditions(2), &rows);
        assert!(selection.achievability["C1"]);
        assert!(!selection.achievability["C2"]);
        assert_eq!(selection.pairs.len(), 1);
        assert_eq!(selection.test_cases.len(), 2);
    }
}
