//! Coverage engine: owns every run and is the only writer of run state

use super::clock::{Clock, SystemClock};
use super::gaps::identify_gaps;
use super::policy::{evaluate_stop, PLATEAU_DELTA};
use super::source::{estimate_coverage, CoverageReading, CoverageSnapshot, Provenance};
use super::{
    effectiveness_score, CoverageGap, CoverageRun, McdcRecord, RunContext, RunStatus,
    StopDecision, StopReason, TestEffectiveness,
};
use crate::config::CoverageConfig;
use crate::diff::ChangedFile;
use crate::error::{Error, Result};
use crate::mcdc::McdcResult;
use crate::report::{assemble_report, Report, ReportType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One executed test as reported by the test feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestExecution {
    pub test_id: String,
    pub test_name: String,
    #[serde(default)]
    pub execution_time_ms: u64,
}

impl TestExecution {
    pub fn new(
        test_id: impl Into<String>,
        test_name: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            test_id: test_id.into(),
            test_name: test_name.into(),
            execution_time_ms,
        }
    }
}

/// Owner of all coverage runs
///
/// Mutating operations take `&mut self`; a host that shares an engine across
/// threads wraps it in a mutex.
pub struct CoverageEngine {
    runs: BTreeMap<String, CoverageRun>,
    clock: Arc<dyn Clock>,
    sequence: u64,
}

impl Default for CoverageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CoverageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverageEngine")
            .field("runs", &self.runs.keys().collect::<Vec<_>>())
            .field("sequence", &self.sequence)
            .finish()
    }
}

impl CoverageEngine {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            runs: BTreeMap::new(),
            clock,
            sequence: 0,
        }
    }

    /// Start a run, or return the running one started with the same context
    pub fn start_coverage(&mut self, config: CoverageConfig, context: RunContext) -> CoverageRun {
        if let Some(existing) = self
            .runs
            .values()
            .find(|r| r.status == RunStatus::Running && r.context == context)
        {
            debug!(run = %existing.run_id, "coverage already started for this context");
            return existing.clone();
        }

        let started_at = self.clock.now();
        self.sequence += 1;
        let run_id = run_id(started_at, self.sequence);

        info!(
            run = %run_id,
            threshold = config.changed_lines_threshold,
            mcdc_required = config.mcdc_required,
            "coverage run started"
        );
        let run = CoverageRun::new(run_id.clone(), config, context, started_at);
        self.runs.insert(run_id, run.clone());
        run
    }

    pub fn get_run(&self, run_id: &str) -> Option<&CoverageRun> {
        self.runs.get(run_id)
    }

    pub fn runs(&self) -> impl Iterator<Item = &CoverageRun> {
        self.runs.values()
    }

    /// Attach the diff under test; excluded files are dropped
    ///
    /// Returns the number of files kept.
    pub fn set_changed_files(&mut self, run_id: &str, files: Vec<ChangedFile>) -> Result<usize> {
        let run = self.running_mut(run_id)?;

        let (kept, dropped): (Vec<ChangedFile>, Vec<ChangedFile>) = files
            .into_iter()
            .partition(|f| !run.config.is_excluded(&f.path));
        if !dropped.is_empty() {
            debug!(run = %run_id, excluded = dropped.len(), "dropped excluded changed files");
        }

        run.changed_lines_total = kept.iter().map(ChangedFile::line_count).sum();
        run.changed_files = kept;

        if let Some(snapshot) = &run.latest_snapshot {
            run.changed_lines_covered = snapshot.covered_changed_lines(&run.changed_files).len();
            let coverage = percent(run.changed_lines_covered, run.changed_lines_total);
            run.overall_coverage_percent = coverage;
            run.last_coverage_percent = coverage;
        }

        Ok(run.changed_files.len())
    }

    /// Record a test with no coverage signal; coverage is estimated
    pub fn record_test_execution(
        &mut self,
        run_id: &str,
        test_id: &str,
        test_name: &str,
        execution_time_ms: u64,
    ) -> Result<TestEffectiveness> {
        let next = {
            let run = self.running_mut(run_id)?;
            estimate_coverage(run.test_count + 1)
        };
        self.record(
            run_id,
            TestExecution::new(test_id, test_name, execution_time_ms),
            CoverageReading::Estimated(next),
        )
    }

    /// Record a test with a cumulative measured snapshot
    pub fn record_measured_execution(
        &mut self,
        run_id: &str,
        execution: TestExecution,
        snapshot: CoverageSnapshot,
    ) -> Result<TestEffectiveness> {
        self.record(run_id, execution, CoverageReading::Measured(snapshot))
    }

    /// Record a test with any coverage reading
    pub fn record(
        &mut self,
        run_id: &str,
        execution: TestExecution,
        reading: CoverageReading,
    ) -> Result<TestEffectiveness> {
        let now = self.clock.now();
        let run = self.running_mut(run_id)?;
        let effectiveness = apply_reading(run, execution, reading, now);

        debug!(
            run = %run_id,
            test = %effectiveness.test_id,
            coverage = run.overall_coverage_percent,
            delta = effectiveness.coverage_delta_percent,
            plateau = run.plateau_count,
            "test recorded"
        );
        Ok(effectiveness)
    }

    /// Register the MC/DC obligations of an analyzed decision
    ///
    /// Re-recording a decision replaces its obligations and keeps executed
    /// cases that are still required.
    pub fn record_mcdc_analysis(&mut self, run_id: &str, result: &McdcResult) -> Result<()> {
        let run = self.running_mut(run_id)?;
        let mut record = McdcRecord::from_result(result);

        if let Some(pos) = run
            .mcdc_records
            .iter()
            .position(|r| r.decision_id == record.decision_id)
        {
            let previous = run.mcdc_records.remove(pos);
            record.executed_cases = previous
                .executed_cases
                .into_iter()
                .filter(|id| record.required_cases.iter().any(|c| &c.test_id == id))
                .collect();
            run.mcdc_records.insert(pos, record);
        } else {
            run.mcdc_records.push(record);
        }

        run.mcdc_satisfied = run.compute_mcdc_satisfied();
        Ok(())
    }

    /// Mark one required MC/DC case executed
    ///
    /// Returns `false` when the decision or case is not part of the run.
    pub fn mark_mcdc_case_executed(
        &mut self,
        run_id: &str,
        decision_id: &str,
        test_case_id: &str,
    ) -> Result<bool> {
        let run = self.running_mut(run_id)?;
        let Some(record) = run
            .mcdc_records
            .iter_mut()
            .find(|r| r.decision_id == decision_id)
        else {
            return Ok(false);
        };
        if !record.required_cases.iter().any(|c| c.test_id == test_case_id) {
            return Ok(false);
        }

        record.executed_cases.insert(test_case_id.to_string());
        run.mcdc_satisfied = run.compute_mcdc_satisfied();
        Ok(true)
    }

    /// Evaluate the stop policy and keep the decision in the run's history
    pub fn should_stop_testing(&mut self, run_id: &str) -> Result<StopDecision> {
        let now = self.clock.now();
        let run = self.running_mut(run_id)?;

        run.mcdc_satisfied = run.compute_mcdc_satisfied();
        let decision = evaluate_stop(run, now);
        if decision.should_stop {
            run.stop_reason = decision.stop_reason;
            info!(run = %run_id, reason = %decision.reason, "stop recommended");
        }
        run.stop_decisions.push(decision.clone());
        Ok(decision)
    }

    /// Current gaps of a run; finalized runs return the gaps frozen at finalization
    pub fn identify_coverage_gaps(&mut self, run_id: &str) -> Result<Vec<CoverageGap>> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::CoverageNotStarted(run_id.to_string()))?;
        if !run.is_finalized() {
            run.gaps = identify_gaps(run);
        }
        Ok(run.gaps.clone())
    }

    /// Finalize the run once (`COMPLETED`), then render the requested report
    ///
    /// Later calls re-render from the frozen state.
    pub fn generate_report(&mut self, run_id: &str, report_type: ReportType) -> Result<Report> {
        let now = self.clock.now();
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::CoverageNotStarted(run_id.to_string()))?;
        if !run.is_finalized() {
            finalize(run, RunStatus::Completed, now);
        }
        let run: &CoverageRun = run;
        assemble_report(
            run,
            &run.gaps,
            &run.test_effectiveness,
            &run.config,
            report_type,
        )
    }

    /// Halt a run from outside the policy (`STOPPED`)
    pub fn stop_coverage(&mut self, run_id: &str, reason: StopReason) -> Result<CoverageRun> {
        let now = self.clock.now();
        let run = self.running_mut(run_id)?;
        run.stop_reason = Some(reason);
        finalize(run, RunStatus::Stopped, now);
        Ok(run.clone())
    }

    /// End a run because the host hit an error (`FAILED`)
    pub fn mark_failed(&mut self, run_id: &str, message: &str) -> Result<CoverageRun> {
        let now = self.clock.now();
        let run = self.running_mut(run_id)?;
        warn!(run = %run_id, error = message, "coverage run failed");
        run.stop_reason = Some(StopReason::Error);
        run.failure_message = Some(message.to_string());
        finalize(run, RunStatus::Failed, now);
        Ok(run.clone())
    }

    fn running_mut(&mut self, run_id: &str) -> Result<&mut CoverageRun> {
        let run = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::CoverageNotStarted(run_id.to_string()))?;
        if run.is_finalized() {
            return Err(Error::RunFinalized {
                run_id: run_id.to_string(),
                status: run.status,
            });
        }
        Ok(run)
    }
}

fn run_id(started_at: DateTime<Utc>, sequence: u64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(started_at.to_rfc3339().as_bytes());
    hasher.update(sequence.to_le_bytes());
    format!("run-{}", hex::encode(&hasher.finalize()[..6]))
}

fn percent(covered: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        covered as f64 / total as f64 * 100.0
    }
}

fn apply_reading(
    run: &mut CoverageRun,
    execution: TestExecution,
    reading: CoverageReading,
    now: DateTime<Utc>,
) -> TestEffectiveness {
    let provenance = reading.provenance();
    let previous = run.last_coverage_percent;

    let (current, delta_lines, delta_branches, unique) = match reading {
        CoverageReading::Measured(snapshot) => {
            let before = run
                .latest_snapshot
                .as_ref()
                .map(|s| s.covered_changed_lines(&run.changed_files))
                .unwrap_or_default();
            let after = snapshot.covered_changed_lines(&run.changed_files);
            let unique = after.difference(&before).count();

            let delta_lines = after.len() as i64 - run.changed_lines_covered as i64;
            let delta_branches = snapshot.branches_covered as i64 - run.branches_covered as i64;

            run.changed_lines_covered = after.len();
            run.branches_covered = snapshot.branches_covered;
            run.branches_total = snapshot.branches_total;
            run.latest_snapshot = Some(snapshot);

            (
                percent(run.changed_lines_covered, run.changed_lines_total),
                delta_lines,
                delta_branches,
                unique,
            )
        }
        CoverageReading::Estimated(current) => {
            let total = run.changed_lines_total as f64;
            let delta_lines = (total * (current - previous) / 100.0).round() as i64;
            run.changed_lines_covered = (total * current / 100.0).round() as usize;
            (current, delta_lines, 0, delta_lines.max(0) as usize)
        }
    };

    let delta = current - previous;
    if delta.abs() < PLATEAU_DELTA {
        run.plateau_count += 1;
    } else {
        run.plateau_count = 0;
    }
    run.last_coverage_percent = current;
    run.overall_coverage_percent = current;
    run.test_count += 1;
    run.coverage_provenance = Some(Provenance::combine(run.coverage_provenance, provenance));

    let effectiveness = TestEffectiveness {
        effectiveness_score: effectiveness_score(delta, execution.execution_time_ms),
        test_id: execution.test_id,
        test_name: execution.test_name,
        coverage_delta_lines: delta_lines,
        coverage_delta_branches: delta_branches,
        unique_coverage_lines: unique,
        coverage_delta_percent: delta,
        execution_time_ms: execution.execution_time_ms,
        provenance,
        recorded_at: now,
    };
    run.test_effectiveness.push(effectiveness.clone());
    effectiveness
}

fn finalize(run: &mut CoverageRun, status: RunStatus, now: DateTime<Utc>) {
    run.status = status;
    run.completed_at = Some(now);
    run.mcdc_satisfied = run.compute_mcdc_satisfied();
    run.gaps = identify_gaps(run);
    info!(
        run = %run.run_id,
        %status,
        coverage = run.overall_coverage_percent,
        tests = run.test_count,
        "coverage run finalized"
    );
}
