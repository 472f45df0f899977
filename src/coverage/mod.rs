//! Coverage run state machine
//!
//! A `CoverageRun` is one testing session. It is created `RUNNING` by
//! [`CoverageEngine::start_coverage`], fed test executions, asked whether to
//! stop, and finalized exactly once (`COMPLETED` by report generation,
//! `STOPPED` by an explicit halt, `FAILED` on a host error).
//!
//! ```text
//!            record_* / should_stop_testing
//!              ┌──────────┐
//!              ▼          │
//! start ──► RUNNING ──────┘
//!              │ generate_report ─► COMPLETED
//!              │ stop_coverage   ─► STOPPED
//!              └ mark_failed     ─► FAILED
//! ```
//!
//! All mutation goes through the engine; callers only ever see `&CoverageRun`
//! or owned snapshots.

mod clock;
mod engine;
mod gaps;
mod policy;
mod source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{CoverageEngine, TestExecution};
pub use gaps::identify_gaps;
pub use policy::{evaluate_stop, PLATEAU_DELTA};
pub use source::{
    estimate_coverage, BranchLocation, CoverageReading, CoverageSnapshot, Provenance,
};

use crate::config::CoverageConfig;
use crate::diff::ChangedFile;
use crate::mcdc::{McdcResult, McdcTestCase};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Lifecycle state of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Stopped,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RunStatus::Running => "RUNNING",
            RunStatus::Completed => "COMPLETED",
            RunStatus::Failed => "FAILED",
            RunStatus::Stopped => "STOPPED",
        };
        write!(f, "{}", s)
    }
}

/// Why a run stopped (or was told to)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    CoverageThresholdMet,
    Plateau,
    TimeLimit,
    MaxTests,
    Manual,
    Error,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StopReason::CoverageThresholdMet => "coverage threshold met",
            StopReason::Plateau => "coverage plateau",
            StopReason::TimeLimit => "time limit reached",
            StopReason::MaxTests => "maximum test count reached",
            StopReason::Manual => "manual stop",
            StopReason::Error => "error",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for StopReason {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "coverage_threshold_met" | "coverage" => Ok(StopReason::CoverageThresholdMet),
            "plateau" => Ok(StopReason::Plateau),
            "time_limit" | "time" => Ok(StopReason::TimeLimit),
            "max_tests" => Ok(StopReason::MaxTests),
            "manual" => Ok(StopReason::Manual),
            "error" => Ok(StopReason::Error),
            other => Err(format!("unknown stop reason '{}'", other).into()),
        }
    }
}

/// Where the run came from; used to make `start_coverage` idempotent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    pub pr_url: Option<String>,
    pub repo_url: Option<String>,
    pub branch_name: Option<String>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pr_url(mut self, url: impl Into<String>) -> Self {
        self.pr_url = Some(url.into());
        self
    }

    pub fn with_repo_url(mut self, url: impl Into<String>) -> Self {
        self.repo_url = Some(url.into());
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch_name = Some(branch.into());
        self
    }
}

/// One test execution's contribution to the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEffectiveness {
    pub test_id: String,
    pub test_name: String,
    pub coverage_delta_lines: i64,
    pub coverage_delta_branches: i64,
    /// Changed lines first covered by this test
    pub unique_coverage_lines: usize,
    pub coverage_delta_percent: f64,
    pub execution_time_ms: u64,
    pub effectiveness_score: f64,
    pub provenance: Provenance,
    pub recorded_at: DateTime<Utc>,
}

/// `max(0, delta / seconds * 100)`; zero execution time scores zero
pub fn effectiveness_score(delta_percent: f64, execution_time_ms: u64) -> f64 {
    if execution_time_ms == 0 {
        return 0.0;
    }
    let seconds = execution_time_ms as f64 / 1000.0;
    (delta_percent / seconds * 100.0).max(0.0)
}

/// Outcome of one stop evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StopDecision {
    pub decision_time: DateTime<Utc>,
    pub should_stop: bool,
    pub reason: String,
    pub confidence_score: f64,
    /// Rule that matched, when the decision is a stop
    pub stop_reason: Option<StopReason>,
    pub metrics: BTreeMap<String, serde_json::Value>,
}

/// Kind of untested code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapType {
    UncoveredLines,
    UncoveredBranch,
    UncoveredCondition,
    UncoveredPath,
    PartialMcdc,
}

impl GapType {
    /// Base risk before criticality and size adjustments
    pub fn base_risk(&self) -> f64 {
        match self {
            GapType::UncoveredLines => 0.4,
            GapType::UncoveredBranch => 0.6,
            GapType::UncoveredCondition => 0.7,
            GapType::UncoveredPath => 0.5,
            GapType::PartialMcdc => 0.65,
        }
    }
}

impl std::fmt::Display for GapType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GapType::UncoveredLines => "UNCOVERED_LINES",
            GapType::UncoveredBranch => "UNCOVERED_BRANCH",
            GapType::UncoveredCondition => "UNCOVERED_CONDITION",
            GapType::UncoveredPath => "UNCOVERED_PATH",
            GapType::PartialMcdc => "PARTIAL_MCDC",
        };
        write!(f, "{}", s)
    }
}

/// Gap priority; `Critical` sorts first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GapPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl std::fmt::Display for GapPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GapPriority::Critical => "CRITICAL",
            GapPriority::High => "HIGH",
            GapPriority::Medium => "MEDIUM",
            GapPriority::Low => "LOW",
        };
        write!(f, "{}", s)
    }
}

/// A region of changed code the run has not exercised
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    pub file_path: String,
    pub line_start: u32,
    pub line_end: u32,
    pub gap_type: GapType,
    pub priority: GapPriority,
    pub suggested_test: Option<String>,
    pub risk_score: f64,
}

impl CoverageGap {
    pub fn line_count(&self) -> u32 {
        self.line_end.saturating_sub(self.line_start) + 1
    }
}

/// MC/DC obligations of one analyzed decision within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McdcRecord {
    pub decision_id: String,
    pub file_path: String,
    pub line_number: usize,
    pub expression: String,
    pub is_achievable: bool,
    pub reason: Option<String>,
    pub required_cases: Vec<McdcTestCase>,
    pub executed_cases: BTreeSet<String>,
    /// `(condition id, condition text)` for conditions with no independence
    /// pair, in condition order
    pub unpaired_conditions: Vec<(String, String)>,
    /// Analysis hit the complexity guard; no truth table was built
    pub complexity_exceeded: bool,
}

impl McdcRecord {
    pub fn from_result(result: &McdcResult) -> Self {
        let d = &result.decision;
        let complexity_exceeded = result.truth_table.is_empty() && !d.conditions.is_empty();
        let unpaired = if complexity_exceeded {
            Vec::new()
        } else {
            result.unpaired_conditions()
        };
        let unpaired_conditions = unpaired
            .into_iter()
            .filter_map(|id| {
                d.conditions
                    .iter()
                    .find(|c| c.id == id)
                    .map(|c| (c.id.clone(), c.expression.clone()))
            })
            .collect();

        Self {
            decision_id: d.id.clone(),
            file_path: d.file_path.clone(),
            line_number: d.line_number,
            expression: d.full_expression.clone(),
            is_achievable: result.is_achievable,
            reason: result.reason.clone(),
            required_cases: result.required_test_cases.clone(),
            executed_cases: BTreeSet::new(),
            unpaired_conditions,
            complexity_exceeded,
        }
    }

    /// Required test ids not executed yet
    pub fn pending_cases(&self) -> Vec<&McdcTestCase> {
        self.required_cases
            .iter()
            .filter(|c| !self.executed_cases.contains(&c.test_id))
            .collect()
    }

    /// Achievable and every required case executed
    pub fn is_satisfied(&self) -> bool {
        self.is_achievable && !self.required_cases.is_empty() && self.pending_cases().is_empty()
    }
}

/// Mutable aggregate for one testing session, owned by `CoverageEngine`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRun {
    pub run_id: String,
    pub context: RunContext,
    pub config: CoverageConfig,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: RunStatus,
    pub stop_reason: Option<StopReason>,
    /// Set when the run ends in `FAILED`
    pub failure_message: Option<String>,

    pub overall_coverage_percent: f64,
    pub changed_lines_covered: usize,
    pub changed_lines_total: usize,
    pub branches_covered: usize,
    pub branches_total: usize,
    pub mcdc_satisfied: bool,
    pub test_count: u32,
    pub plateau_count: u32,
    pub last_coverage_percent: f64,
    /// `None` until the first coverage reading
    pub coverage_provenance: Option<Provenance>,

    pub changed_files: Vec<ChangedFile>,
    /// Latest cumulative measured snapshot
    pub latest_snapshot: Option<CoverageSnapshot>,

    pub test_effectiveness: Vec<TestEffectiveness>,
    pub stop_decisions: Vec<StopDecision>,
    pub gaps: Vec<CoverageGap>,
    pub mcdc_records: Vec<McdcRecord>,
}

impl CoverageRun {
    pub(crate) fn new(
        run_id: String,
        config: CoverageConfig,
        context: RunContext,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id,
            context,
            config,
            started_at,
            completed_at: None,
            status: RunStatus::Running,
            stop_reason: None,
            failure_message: None,
            overall_coverage_percent: 0.0,
            changed_lines_covered: 0,
            changed_lines_total: 0,
            branches_covered: 0,
            branches_total: 0,
            mcdc_satisfied: false,
            test_count: 0,
            plateau_count: 0,
            last_coverage_percent: 0.0,
            coverage_provenance: None,
            changed_files: Vec::new(),
            latest_snapshot: None,
            test_effectiveness: Vec::new(),
            stop_decisions: Vec::new(),
            gaps: Vec::new(),
            mcdc_records: Vec::new(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.status.is_terminal()
    }

    /// At least one analysis recorded and every one satisfied
    pub fn compute_mcdc_satisfied(&self) -> bool {
        !self.mcdc_records.is_empty() && self.mcdc_records.iter().all(McdcRecord::is_satisfied)
    }

    /// Latest authoritative stop decision
    pub fn latest_stop_decision(&self) -> Option<&StopDecision> {
        self.stop_decisions.last()
    }

    pub fn branch_coverage_percent(&self) -> Option<f64> {
        (self.branches_total > 0)
            .then(|| self.branches_covered as f64 / self.branches_total as f64 * 100.0)
    }

    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> f64 {
        let end = self.completed_at.unwrap_or(now);
        (end - self.started_at).num_milliseconds().max(0) as f64 / 60_000.0
    }

    pub fn changed_file(&self, path: &str) -> Option<&ChangedFile> {
        self.changed_files.iter().find(|f| f.path == path)
    }

    /// Matches a critical glob or carries a criticality tag
    pub fn is_critical_file(&self, path: &str) -> bool {
        self.config.is_critical(path)
            || self
                .changed_file(path)
                .is_some_and(ChangedFile::is_tagged_critical)
    }

    /// Top `n` tests by effectiveness score, ties in execution order
    pub fn top_tests(&self, n: usize) -> Vec<&TestEffectiveness> {
        let mut tests: Vec<&TestEffectiveness> = self.test_effectiveness.iter().collect();
        tests.sort_by(|a, b| b.effectiveness_score.total_cmp(&a.effectiveness_score));
        tests.truncate(n);
        tests
    }
}
