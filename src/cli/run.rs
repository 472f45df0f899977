//! Replay a recorded test feed through a coverage run
//!
//! The feed is a JSON array of events:
//!
//! ```json
//! [
//!   {"test_id": "t1", "test_name": "login ok", "execution_time_ms": 120,
//!    "snapshot": {"covered_lines": {"src/auth.rs": [10, 11]}},
//!    "mcdc_cases": [{"decision_id": "src/auth.rs:10", "test_case_id": "T2"}]}
//! ]
//! ```
//!
//! Events without a `snapshot` are recorded with estimated coverage.

use super::util::{flag_value, flag_values, has_flag, mcdc_options, parse_output_arg, write_output};
use mcdc_gate::*;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::info;

/// One entry of the replayed feed
#[derive(Debug, Deserialize)]
pub struct FeedEvent {
    #[serde(flatten)]
    pub execution: TestExecution,
    #[serde(default)]
    pub snapshot: Option<CoverageSnapshot>,
    #[serde(default)]
    pub mcdc_cases: Vec<CaseRef>,
}

#[derive(Debug, Deserialize)]
pub struct CaseRef {
    pub decision_id: String,
    pub test_case_id: String,
}

pub fn cmd_run(args: &[String]) -> Result<()> {
    let Some(feed_path) = args.first().filter(|a| !a.starts_with("--")) else {
        return Err("Usage: mcdc-gate run <feed.json> [--config preset|path] [--diff file.diff] \
                    [--analyze src.rs]... [--report summary|json|html] [--output F]"
            .into());
    };

    let config = CoverageConfig::resolve(flag_value(args, "--config").unwrap_or("default"))?;
    let validation = config.validate();
    if validation.has_errors() {
        eprint!("{}", validation.to_report());
        return Err(Error::Config("invalid coverage config".into()));
    }
    let report_type: ReportType = flag_value(args, "--report").unwrap_or("summary").parse()?;

    let feed: Vec<FeedEvent> = serde_json::from_str(&fs::read_to_string(feed_path)?)?;

    let mut context = RunContext::new();
    if let Some(branch) = flag_value(args, "--branch") {
        context = context.with_branch(branch);
    }
    if let Some(pr) = flag_value(args, "--pr") {
        context = context.with_pr_url(pr);
    }

    let mut engine = CoverageEngine::new();
    let run_id = engine.start_coverage(config.clone(), context).run_id;

    if let Some(diff_path) = flag_value(args, "--diff") {
        let files = parse_unified_diff(&fs::read_to_string(diff_path)?);
        let kept = engine.set_changed_files(&run_id, files)?;
        info!(run = %run_id, files = kept, "diff attached");
    }

    let analyzer = McdcAnalyzer::with_options(mcdc_options(args, McdcOptions::from(&config))?);
    for source in flag_values(args, "--analyze") {
        for result in analyze_source(&analyzer, source)? {
            engine.record_mcdc_analysis(&run_id, &result)?;
        }
    }

    for event in feed {
        match event.snapshot {
            Some(snapshot) => engine.record_measured_execution(&run_id, event.execution, snapshot)?,
            None => engine.record_test_execution(
                &run_id,
                &event.execution.test_id,
                &event.execution.test_name,
                event.execution.execution_time_ms,
            )?,
        };
        for case in &event.mcdc_cases {
            engine.mark_mcdc_case_executed(&run_id, &case.decision_id, &case.test_case_id)?;
        }

        let decision = engine.should_stop_testing(&run_id)?;
        if decision.should_stop {
            break;
        }
    }

    if has_flag(args, "--stop") {
        engine.stop_coverage(&run_id, StopReason::Manual)?;
    }
    let report = engine.generate_report(&run_id, report_type)?;
    write_output(&parse_output_arg(args), &report.render()?)?;

    let passed = engine
        .get_run(&run_id)
        .is_some_and(|run| thresholds_met(run, &config));
    if passed {
        Ok(())
    } else {
        Err(Error::Other(format!("run {} finished below threshold", run_id)))
    }
}

fn analyze_source(analyzer: &McdcAnalyzer, path: &str) -> Result<Vec<McdcResult>> {
    let language = detect_language(path)
        .ok_or_else(|| Error::UnsupportedLanguage(format!("cannot detect language of {}", path)))?;
    let code = fs::read_to_string(Path::new(path))?;
    analyze_file_with(analyzer, path, &code, language)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_event_shapes() {
        let feed: Vec<FeedEvent> = serde_json::from_str(
            r#"[
                {"test_id": "t1", "test_name": "a", "execution_time_ms": 10},
                {"test_id": "t2", "test_name": "b",
                 "snapshot": {"covered_lines": {"src/a.rs": [1, 2]}, "branches_total": 2},
                 "mcdc_cases": [{"decision_id": "src/a.rs:1", "test_case_id": "T1"}]}
            ]"#,
        )
        .unwrap();

        assert_eq!(feed.len(), 2);
        assert!(feed[0].snapshot.is_none());
        assert_eq!(feed[1].execution.execution_time_ms, 0);
        let snapshot = feed[1].snapshot.as_ref().unwrap();
        assert!(snapshot.is_line_covered("src/a.rs", 2));
        assert_eq!(snapshot.branches_total, 2);
        assert_eq!(feed[1].mcdc_cases[0].test_case_id, "T1");
    }
}
