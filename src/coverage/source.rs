//! Coverage signal provenance
//!
//! A reading is either measured (a cumulative snapshot from real
//! instrumentation) or estimated by a fixed diminishing-returns curve when
//! the host has no coverage signal. The two are never blended silently: the
//! run carries a `Provenance` and reports label estimated numbers.

use crate::diff::ChangedFile;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Ceiling the estimator approaches
pub const ESTIMATE_CEILING: f64 = 95.0;
/// Per-test retention factor of the remaining gap
pub const ESTIMATE_DECAY: f64 = 0.85;

/// Estimated coverage percent after `tests` executions: `95 * (1 - 0.85^n)`
pub fn estimate_coverage(tests: u32) -> f64 {
    ESTIMATE_CEILING * (1.0 - ESTIMATE_DECAY.powi(tests as i32))
}

/// How the run's coverage numbers were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Measured,
    Estimated,
    /// Both kinds of reading were recorded in one run
    Mixed,
}

impl Provenance {
    /// Fold a new reading's provenance into the run's
    pub fn combine(current: Option<Provenance>, next: Provenance) -> Provenance {
        match current {
            None => next,
            Some(p) if p == next => p,
            Some(_) => Provenance::Mixed,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Provenance::Measured => "measured",
            Provenance::Estimated => "estimated",
            Provenance::Mixed => "measured+estimated",
        }
    }

    pub fn is_estimated(&self) -> bool {
        !matches!(self, Provenance::Measured)
    }
}

impl std::fmt::Display for Provenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A branch the instrumentation saw but never took
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchLocation {
    pub file_path: String,
    pub line: u32,
    #[serde(default)]
    pub description: Option<String>,
}

/// Cumulative measured coverage after some test
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageSnapshot {
    /// File path → covered line numbers
    #[serde(default)]
    pub covered_lines: BTreeMap<String, BTreeSet<u32>>,
    #[serde(default)]
    pub branches_covered: usize,
    #[serde(default)]
    pub branches_total: usize,
    #[serde(default)]
    pub uncovered_branches: Vec<BranchLocation>,
}

impl CoverageSnapshot {
    pub fn is_line_covered(&self, file_path: &str, line: u32) -> bool {
        self.covered_lines
            .get(file_path)
            .is_some_and(|lines| lines.contains(&line))
    }

    /// Changed lines covered by this snapshot, as `(path, line)` pairs
    pub fn covered_changed_lines(&self, files: &[ChangedFile]) -> BTreeSet<(String, u32)> {
        files
            .iter()
            .flat_map(|f| {
                f.changed_lines()
                    .filter(|line| self.is_line_covered(&f.path, *line))
                    .map(|line| (f.path.clone(), line))
            })
            .collect()
    }
}

/// One coverage signal for a test execution
#[derive(Debug, Clone, PartialEq)]
pub enum CoverageReading {
    Measured(CoverageSnapshot),
    /// Percent of changed lines
    Estimated(f64),
}

impl CoverageReading {
    pub fn provenance(&self) -> Provenance {
        match self {
            CoverageReading::Measured(_) => Provenance::Measured,
            CoverageReading::Estimated(_) => Provenance::Estimated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::LineRange;

    #[test]
    fn test_estimator_is_monotone_with_diminishing_returns() {
        assert_eq!(estimate_coverage(0), 0.0);
        let mut last = 0.0;
        let mut last_gain = f64::MAX;
        for n in 1..60 {
            let now = estimate_coverage(n);
            let gain = now - last;
            assert!(now >= last);
            assert!(gain <= last_gain);
            assert!(now < ESTIMATE_CEILING);
            last = now;
            last_gain = gain;
        }
        assert!((estimate_coverage(1) - 14.25).abs() < 1e-9);
    }

    #[test]
    fn test_provenance_combine() {
        assert_eq!(Provenance::combine(None, Provenance::Measured), Provenance::Measured);
        assert_eq!(
            Provenance::combine(Some(Provenance::Estimated), Provenance::Estimated),
            Provenance::Estimated
        );
        assert_eq!(
            Provenance::combine(Some(Provenance::Measured), Provenance::Estimated),
            Provenance::Mixed
        );
    }

    #[test]
    fn test_covered_changed_lines() {
        let files = vec![ChangedFile::new("src/a.rs", vec![LineRange::new(10, 13)])];
        let mut snapshot = CoverageSnapshot::default();
        snapshot
            .covered_lines
            .insert("src/a.rs".into(), [9, 10, 12].into_iter().collect());

        let covered = snapshot.covered_changed_lines(&files);
        assert_eq!(covered.len(), 2);
        assert!(covered.contains(&("src/a.rs".to_string(), 12)));
    }
}
