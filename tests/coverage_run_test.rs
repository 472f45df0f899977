//! Coverage run lifecycle and stop policy through the engine

use chrono::{Duration, TimeZone, Utc};
use mcdc_gate::{
    analyze_decision, parse_unified_diff, ChangedFile, CoverageConfig, CoverageEngine,
    CoverageSnapshot, Error, LineRange, ManualClock, Provenance, ReportType, RunContext,
    RunStatus, StopReason, TestExecution,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn engine() -> (CoverageEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 5, 11, 9, 30, 0).unwrap(),
    ));
    (CoverageEngine::with_clock(clock.clone()), clock)
}

fn covering(path: &str, lines: &[u32]) -> CoverageSnapshot {
    let mut snapshot = CoverageSnapshot::default();
    snapshot
        .covered_lines
        .insert(path.to_string(), lines.iter().copied().collect());
    snapshot
}

#[test]
fn test_fresh_run_continues() {
    let (mut engine, _) = engine();
    let run = engine.start_coverage(CoverageConfig::default(), RunContext::new());

    assert_eq!(run.status, RunStatus::Running);
    assert_eq!(run.test_count, 0);
    assert!(run.completed_at.is_none());

    let decision = engine.should_stop_testing(&run.run_id).unwrap();
    assert!(!decision.should_stop);
    assert_eq!(decision.confidence_score, 0.8);
    assert!(decision.reason.starts_with("Continue testing"));
    assert_eq!(decision.stop_reason, None);
}

#[test]
fn test_mcdc_requirement_outranks_every_stop_rule() {
    let (mut engine, clock) = engine();
    let run = engine.start_coverage(CoverageConfig::default(), RunContext::new());
    let id = run.run_id.as_str();

    engine
        .set_changed_files(id, vec![ChangedFile::new("src/lib.rs", vec![LineRange::new(1, 2)])])
        .unwrap();
    engine
        .record_mcdc_analysis(id, &analyze_decision("a && b", "src/lib.rs", 1))
        .unwrap();

    for i in 0..6 {
        engine
            .record_measured_execution(
                id,
                TestExecution::new(format!("t{}", i), format!("test {}", i), 100),
                covering("src/lib.rs", &[1, 2]),
            )
            .unwrap();
    }
    clock.advance(Duration::minutes(31));

    let state = engine.get_run(id).unwrap();
    assert_eq!(state.overall_coverage_percent, 100.0);
    assert_eq!(state.plateau_count, 5);

    let decision = engine.should_stop_testing(id).unwrap();
    assert!(!decision.should_stop);
    assert_eq!(decision.confidence_score, 0.7);
    assert!(decision.reason.contains("MC/DC not satisfied"));
}

#[test]
fn test_strict_run_stops_once_everything_is_covered() {
    let (mut engine, _) = engine();
    let run = engine.start_coverage(CoverageConfig::strict(), RunContext::new());
    let id = run.run_id.as_str();

    engine
        .set_changed_files(id, vec![ChangedFile::new("src/gate.rs", vec![LineRange::new(10, 12)])])
        .unwrap();
    let result = analyze_decision("ready && !blocked", "src/gate.rs", 11);
    engine.record_mcdc_analysis(id, &result).unwrap();
    engine
        .record_measured_execution(
            id,
            TestExecution::new("t1", "gate opens", 250),
            covering("src/gate.rs", &[10, 11, 12]),
        )
        .unwrap();

    for case in &result.required_test_cases {
        assert!(engine
            .mark_mcdc_case_executed(id, "src/gate.rs:11", &case.test_id)
            .unwrap());
    }
    assert!(engine.get_run(id).unwrap().mcdc_satisfied);

    let decision = engine.should_stop_testing(id).unwrap();
    assert!(decision.should_stop);
    assert_eq!(decision.confidence_score, 1.0);
    assert_eq!(decision.stop_reason, Some(StopReason::CoverageThresholdMet));
    assert_eq!(
        engine.get_run(id).unwrap().stop_reason,
        Some(StopReason::CoverageThresholdMet)
    );
}

#[test]
fn test_zero_duration_test_scores_zero() {
    let (mut engine, _) = engine();
    let run = engine.start_coverage(CoverageConfig::default(), RunContext::new());

    let effectiveness = engine
        .record_test_execution(&run.run_id, "t1", "instant", 0)
        .unwrap();
    assert_eq!(effectiveness.effectiveness_score, 0.0);
    assert!(effectiveness.coverage_delta_percent > 0.0);
    assert_eq!(effectiveness.provenance, Provenance::Estimated);
}

#[test]
fn test_count_is_monotonic() {
    let (mut engine, _) = engine();
    let run = engine.start_coverage(CoverageConfig::permissive(), RunContext::new());

    let mut last = 0.0;
    for k in 1..=12u32 {
        engine
            .record_test_execution(&run.run_id, &format!("t{}", k), "x", u64::from(k) * 10)
            .unwrap();
        let state = engine.get_run(&run.run_id).unwrap();
        assert_eq!(state.test_count, k);
        assert!(state.overall_coverage_percent >= last);
        last = state.overall_coverage_percent;
    }
    assert_eq!(engine.get_run(&run.run_id).unwrap().test_effectiveness.len(), 12);
}

#[test]
fn test_estimated_runs_reach_the_plateau() {
    let (mut engine, _) = engine();
    let config = CoverageConfig {
        changed_lines_threshold: 99.0,
        ..CoverageConfig::default()
    };
    let run = engine.start_coverage(config, RunContext::new());

    let mut stopped = None;
    for k in 1..=100u32 {
        engine
            .record_test_execution(&run.run_id, &format!("t{}", k), "x", 100)
            .unwrap();
        let decision = engine.should_stop_testing(&run.run_id).unwrap();
        if decision.should_stop {
            stopped = Some(decision);
            break;
        }
    }

    let decision = stopped.expect("run should stop before max_tests");
    assert_eq!(decision.stop_reason, Some(StopReason::Plateau));
    assert_eq!(decision.confidence_score, 0.85);
    assert_eq!(decision.metrics["provenance"], "estimated");
}

#[test]
fn test_report_finalizes_exactly_once() {
    let (mut engine, clock) = engine();
    let run = engine.start_coverage(CoverageConfig::default(), RunContext::new());
    engine
        .record_test_execution(&run.run_id, "t1", "first", 100)
        .unwrap();

    let first = engine.generate_report(&run.run_id, ReportType::Json).unwrap();
    let completed_at = engine.get_run(&run.run_id).unwrap().completed_at;
    assert!(completed_at.is_some());
    assert_eq!(engine.get_run(&run.run_id).unwrap().status, RunStatus::Completed);

    clock.advance(Duration::minutes(5));
    let second = engine.generate_report(&run.run_id, ReportType::Json).unwrap();
    assert_eq!(engine.get_run(&run.run_id).unwrap().completed_at, completed_at);
    assert_eq!(first.render().unwrap(), second.render().unwrap());
}

#[test]
fn test_finalized_run_rejects_mutation() {
    let (mut engine, _) = engine();
    let run = engine.start_coverage(CoverageConfig::default(), RunContext::new());
    let stopped = engine.stop_coverage(&run.run_id, StopReason::Manual).unwrap();
    assert_eq!(stopped.status, RunStatus::Stopped);
    assert_eq!(stopped.stop_reason, Some(StopReason::Manual));

    let err = engine
        .record_test_execution(&run.run_id, "t1", "late", 10)
        .unwrap_err();
    assert!(matches!(
        err,
        Error::RunFinalized {
            status: RunStatus::Stopped,
            ..
        }
    ));
    assert!(engine.should_stop_testing(&run.run_id).is_err());

    // Reports still render from the frozen state
    let report = engine.generate_report(&run.run_id, ReportType::Summary).unwrap();
    assert!(report.render().unwrap().contains("[STOPPED]"));
    assert_eq!(engine.get_run(&run.run_id).unwrap().status, RunStatus::Stopped);
}

#[test]
fn test_unknown_run() {
    let (mut engine, _) = engine();
    assert!(engine.get_run("run-000000000000").is_none());
    assert!(matches!(
        engine.should_stop_testing("run-000000000000"),
        Err(Error::CoverageNotStarted(_))
    ));
    assert!(matches!(
        engine.generate_report("run-000000000000", ReportType::Summary),
        Err(Error::CoverageNotStarted(_))
    ));
}

#[test]
fn test_new_run_after_finalize_for_same_context() {
    let (mut engine, _) = engine();
    let ctx = RunContext::new().with_pr_url("https://git.example.com/acme/shop/pull/7");
    let first = engine.start_coverage(CoverageConfig::default(), ctx.clone());
    engine.stop_coverage(&first.run_id, StopReason::Manual).unwrap();

    let second = engine.start_coverage(CoverageConfig::default(), ctx);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(engine.runs().count(), 2);
}

#[test]
fn test_diff_drives_changed_line_totals() {
    let diff = "\
diff --git a/src/payment/charge.rs b/src/payment/charge.rs
--- a/src/payment/charge.rs
+++ b/src/payment/charge.rs
@@ -10,2 +10,4 @@ fn charge()
 let amount = total();
+if amount > limit && !override_ok {
+    return Err(Declined);
+}
 settle(amount)
diff --git a/tests/charge_test.rs b/tests/charge_test.rs
--- a/tests/charge_test.rs
+++ b/tests/charge_test.rs
@@ -1,0 +1,2 @@
+#[test]
+fn declines() {}
";
    let (mut engine, _) = engine();
    let run = engine.start_coverage(CoverageConfig::default(), RunContext::new());
    let kept = engine
        .set_changed_files(&run.run_id, parse_unified_diff(diff))
        .unwrap();
    assert_eq!(kept, 1);

    engine
        .record_measured_execution(
            &run.run_id,
            TestExecution::new("t1", "declines over limit", 400),
            covering("src/payment/charge.rs", &[11, 12]),
        )
        .unwrap();

    let state = engine.get_run(&run.run_id).unwrap();
    assert_eq!(state.changed_lines_total, 3);
    assert_eq!(state.changed_lines_covered, 2);
    assert!(state.is_critical_file("src/payment/charge.rs"));

    let gaps = engine.identify_coverage_gaps(&run.run_id).unwrap();
    assert_eq!(gaps.len(), 1);
    assert_eq!((gaps[0].line_start, gaps[0].line_end), (13, 13));
}
