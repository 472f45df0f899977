//! Stop/continue policy
//!
//! Rules are checked in a fixed order and the first match wins:
//!
//! | # | Condition                                         | Stop | Confidence  |
//! |---|---------------------------------------------------|------|-------------|
//! | 1 | coverage ≥ threshold, MC/DC required, unsatisfied | no   | 0.7         |
//! | 2 | coverage ≥ threshold                              | yes  | 1.0 / 0.95  |
//! | 3 | plateau count ≥ plateau_test_count                | yes  | 0.85        |
//! | 4 | elapsed minutes ≥ time_limit_minutes              | yes  | 1.0         |
//! | 5 | test count ≥ max_tests                            | yes  | 0.9         |
//! | 6 | otherwise                                         | no   | 0.8         |

use super::{CoverageRun, StopDecision, StopReason};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::collections::BTreeMap;

/// Gains below this many percentage points count toward a plateau
pub const PLATEAU_DELTA: f64 = 0.1;

/// Evaluate the policy against the run's current counters
pub fn evaluate_stop(run: &CoverageRun, now: DateTime<Utc>) -> StopDecision {
    let config = &run.config;
    let coverage = run.overall_coverage_percent;
    let threshold = config.changed_lines_threshold;
    let mcdc_satisfied = run.compute_mcdc_satisfied();
    let elapsed = run.elapsed_minutes(now);
    let threshold_met = coverage >= threshold;

    let (should_stop, confidence, stop_reason, reason) = if threshold_met
        && config.mcdc_required
        && !mcdc_satisfied
    {
        (
            false,
            0.7,
            None,
            format!(
                "Coverage threshold met ({:.1}% >= {:.1}%) but MC/DC not satisfied",
                coverage, threshold
            ),
        )
    } else if threshold_met {
        let confidence = if mcdc_satisfied { 1.0 } else { 0.95 };
        let suffix = if mcdc_satisfied {
            " and MC/DC satisfied"
        } else {
            ""
        };
        (
            true,
            confidence,
            Some(StopReason::CoverageThresholdMet),
            format!(
                "Coverage threshold met ({:.1}% >= {:.1}%){}",
                coverage, threshold, suffix
            ),
        )
    } else if run.plateau_count >= config.plateau_test_count {
        (
            true,
            0.85,
            Some(StopReason::Plateau),
            format!(
                "Coverage plateaued: {} consecutive tests added less than {}%",
                run.plateau_count, PLATEAU_DELTA
            ),
        )
    } else if elapsed >= config.time_limit_minutes as f64 {
        (
            true,
            1.0,
            Some(StopReason::TimeLimit),
            format!(
                "Time limit reached ({:.1} of {} minutes)",
                elapsed, config.time_limit_minutes
            ),
        )
    } else if run.test_count >= config.max_tests {
        (
            true,
            0.9,
            Some(StopReason::MaxTests),
            format!("Maximum test count reached ({})", config.max_tests),
        )
    } else {
        (
            false,
            0.8,
            None,
            format!(
                "Continue testing: {:.1}% remaining to reach {:.1}% threshold",
                (threshold - coverage).max(0.0),
                threshold
            ),
        )
    };

    let provenance = run
        .coverage_provenance
        .map(|p| p.label())
        .unwrap_or("none");
    let metrics: BTreeMap<String, serde_json::Value> = [
        ("coverage", json!(coverage)),
        ("threshold", json!(threshold)),
        ("plateau_count", json!(run.plateau_count)),
        ("test_count", json!(run.test_count)),
        ("elapsed_minutes", json!(elapsed)),
        ("mcdc_satisfied", json!(mcdc_satisfied)),
        ("provenance", json!(provenance)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    StopDecision {
        decision_time: now,
        should_stop,
        reason,
        confidence_score: confidence,
        stop_reason,
        metrics,
    }
}
