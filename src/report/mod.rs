//! Report assembly
//!
//! `assemble_report` is a pure function of run state; it never finalizes a
//! run, writes files or talks to a sink. Three shapes are produced:
//!
//! - summary: plain text for terminals and CI logs
//! - json: a `serde_json::Value` tree
//! - html: an [`HtmlReport`] section tree, rendered with a MiniJinja template
//!
//! Coverage numbers that came from the estimator are labeled as such in all
//! three.

mod html;

pub use html::{HtmlBlock, HtmlReport, HtmlSection};

use crate::config::CoverageConfig;
use crate::coverage::{CoverageGap, CoverageRun, TestEffectiveness};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::str::FromStr;

/// Number of tests listed as most effective
pub const TOP_TESTS: usize = 10;

/// Requested report shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Summary,
    Json,
    Html,
}

impl FromStr for ReportType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "summary" | "text" => Ok(ReportType::Summary),
            "json" => Ok(ReportType::Json),
            "html" => Ok(ReportType::Html),
            other => Err(Error::Report(format!(
                "unknown report type '{}' (expected summary, json or html)",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ReportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReportType::Summary => "summary",
            ReportType::Json => "json",
            ReportType::Html => "html",
        };
        write!(f, "{}", s)
    }
}

/// An assembled report
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Summary(String),
    Json(serde_json::Value),
    Html(HtmlReport),
}

impl Report {
    pub fn report_type(&self) -> ReportType {
        match self {
            Report::Summary(_) => ReportType::Summary,
            Report::Json(_) => ReportType::Json,
            Report::Html(_) => ReportType::Html,
        }
    }

    /// Final text for a sink (HTML is rendered here)
    pub fn render(&self) -> Result<String> {
        match self {
            Report::Summary(text) => Ok(text.clone()),
            Report::Json(value) => Ok(serde_json::to_string_pretty(value)?),
            Report::Html(html) => html.render(),
        }
    }
}

/// Whether the run clears every configured gate
///
/// Branch coverage only counts once a measured reading reported branches.
pub fn thresholds_met(run: &CoverageRun, config: &CoverageConfig) -> bool {
    let coverage = run.overall_coverage_percent;
    let lines_ok =
        coverage >= config.changed_lines_threshold && coverage >= config.min_coverage_percent;
    let branches_ok = run
        .branch_coverage_percent()
        .is_none_or(|pct| pct >= config.branches_threshold);
    let mcdc_ok = !config.mcdc_required || run.compute_mcdc_satisfied();
    lines_ok && branches_ok && mcdc_ok
}

/// Build the requested report from run state
pub fn assemble_report(
    run: &CoverageRun,
    gaps: &[CoverageGap],
    effectiveness: &[TestEffectiveness],
    config: &CoverageConfig,
    report_type: ReportType,
) -> Result<Report> {
    let view = RunView::new(run, gaps, effectiveness, config);
    match report_type {
        ReportType::Summary => Ok(Report::Summary(view.summary())),
        ReportType::Json => Ok(Report::Json(view.json()?)),
        ReportType::Html => Ok(Report::Html(view.html())),
    }
}

/// Everything a report shape needs, computed once
struct RunView<'a> {
    run: &'a CoverageRun,
    gaps: &'a [CoverageGap],
    config: &'a CoverageConfig,
    top_tests: Vec<&'a TestEffectiveness>,
    mcdc_satisfied: bool,
    decisions_satisfied: usize,
    passed: bool,
    estimated: bool,
    provenance: &'static str,
    elapsed_minutes: f64,
}

impl<'a> RunView<'a> {
    fn new(
        run: &'a CoverageRun,
        gaps: &'a [CoverageGap],
        effectiveness: &'a [TestEffectiveness],
        config: &'a CoverageConfig,
    ) -> Self {
        let mut top_tests: Vec<&TestEffectiveness> = effectiveness.iter().collect();
        top_tests.sort_by(|a, b| b.effectiveness_score.total_cmp(&a.effectiveness_score));
        top_tests.truncate(TOP_TESTS);

        let elapsed_minutes = run.elapsed_minutes(run.completed_at.unwrap_or(run.started_at));
        Self {
            run,
            gaps,
            config,
            top_tests,
            mcdc_satisfied: run.compute_mcdc_satisfied(),
            decisions_satisfied: run.mcdc_records.iter().filter(|r| r.is_satisfied()).count(),
            passed: thresholds_met(run, config),
            estimated: run.coverage_provenance.is_some_and(|p| p.is_estimated()),
            provenance: run
                .coverage_provenance
                .map(|p| p.label())
                .unwrap_or("none"),
            elapsed_minutes,
        }
    }

    fn coverage_label(&self) -> String {
        let qualifier = if self.estimated { " (estimated)" } else { "" };
        format!("{:.1}%{}", self.run.overall_coverage_percent, qualifier)
    }

    fn elapsed_label(&self) -> String {
        let total_seconds = (self.elapsed_minutes * 60.0).round() as u64;
        format!("{}m {:02}s", total_seconds / 60, total_seconds % 60)
    }

    fn mark(ok: bool) -> &'static str {
        if ok {
            "✓"
        } else {
            "✗"
        }
    }

    fn summary(&self) -> String {
        let run = self.run;
        let config = self.config;
        let mut out = String::new();

        out.push_str(&format!("Coverage run {} [{}]\n", run.run_id, run.status));
        if let Some(reason) = run.stop_reason {
            out.push_str(&format!("  Stop reason: {}\n", reason));
        }
        if let Some(message) = &run.failure_message {
            out.push_str(&format!("  Failure: {}\n", message));
        }
        if let Some(decision) = run.latest_stop_decision() {
            out.push_str(&format!(
                "  Last decision: {} ({}, confidence {:.2})\n",
                decision.reason,
                if decision.should_stop { "stop" } else { "continue" },
                decision.confidence_score
            ));
        }

        out.push_str("\nThresholds:\n");
        let coverage = run.overall_coverage_percent;
        out.push_str(&format!(
            "  {} Changed lines: {} ({}/{}) / required {:.1}%\n",
            Self::mark(coverage >= config.changed_lines_threshold),
            self.coverage_label(),
            run.changed_lines_covered,
            run.changed_lines_total,
            config.changed_lines_threshold
        ));
        match run.branch_coverage_percent() {
            Some(pct) => out.push_str(&format!(
                "  {} Branches: {:.1}% ({}/{}) / required {:.1}%\n",
                Self::mark(pct >= config.branches_threshold),
                pct,
                run.branches_covered,
                run.branches_total,
                config.branches_threshold
            )),
            None => out.push_str("  - Branches: no measured branch data\n"),
        }
        out.push_str(&format!(
            "  {} MC/DC: {}/{} decisions satisfied{}\n",
            Self::mark(self.mcdc_satisfied || !config.mcdc_required),
            self.decisions_satisfied,
            run.mcdc_records.len(),
            if config.mcdc_required {
                " (required)"
            } else {
                " (optional)"
            }
        ));
        out.push_str(&format!(
            "  Tests executed: {} in {}\n",
            run.test_count,
            self.elapsed_label()
        ));
        if self.estimated {
            out.push_str(&format!(
                "  Note: coverage is {}; no complete measured signal was supplied\n",
                self.provenance
            ));
        }
        out.push_str(&format!(
            "\nResult: {}\n",
            if self.passed {
                "✓ PASSED"
            } else {
                "✗ BELOW THRESHOLD"
            }
        ));

        if !self.top_tests.is_empty() {
            out.push_str("\nMost effective tests:\n");
            for t in &self.top_tests {
                out.push_str(&format!(
                    "  {:>10.1}  {} ({}, +{:.2}%, {}ms)\n",
                    t.effectiveness_score,
                    t.test_name,
                    t.test_id,
                    t.coverage_delta_percent,
                    t.execution_time_ms
                ));
            }
        }

        if self.gaps.is_empty() {
            out.push_str("\nNo coverage gaps.\n");
        } else {
            out.push_str(&format!("\nGaps ({}):\n", self.gaps.len()));
            for gap in self.gaps {
                out.push_str(&format!(
                    "  [{}] {}:{}-{} {} (risk {:.2})\n",
                    gap.priority,
                    gap.file_path,
                    gap.line_start,
                    gap.line_end,
                    gap.gap_type,
                    gap.risk_score
                ));
                if let Some(suggestion) = &gap.suggested_test {
                    out.push_str(&format!("      → {}\n", suggestion));
                }
            }
        }

        out
    }

    fn json(&self) -> Result<serde_json::Value> {
        let run = self.run;
        let config = self.config;

        let decisions: Vec<serde_json::Value> = run
            .mcdc_records
            .iter()
            .map(|r| {
                json!({
                    "decision_id": r.decision_id,
                    "expression": r.expression,
                    "is_achievable": r.is_achievable,
                    "is_satisfied": r.is_satisfied(),
                    "reason": r.reason,
                    "required_test_ids": r.required_cases.iter().map(|c| c.test_id.as_str()).collect::<Vec<_>>(),
                    "executed_test_ids": r.executed_cases,
                    "pending_test_ids": r.pending_cases().iter().map(|c| c.test_id.as_str()).collect::<Vec<_>>(),
                    "unpaired_conditions": r.unpaired_conditions,
                })
            })
            .collect();

        Ok(json!({
            "run": {
                "run_id": run.run_id,
                "status": run.status,
                "stop_reason": run.stop_reason,
                "failure_message": run.failure_message,
                "started_at": run.started_at,
                "completed_at": run.completed_at,
                "context": run.context,
                "overall_coverage_percent": run.overall_coverage_percent,
                "changed_lines_covered": run.changed_lines_covered,
                "changed_lines_total": run.changed_lines_total,
                "branches_covered": run.branches_covered,
                "branches_total": run.branches_total,
                "test_count": run.test_count,
                "plateau_count": run.plateau_count,
                "elapsed_minutes": self.elapsed_minutes,
                "passed": self.passed,
            },
            "thresholds": {
                "changed_lines": {
                    "required": config.changed_lines_threshold,
                    "actual": run.overall_coverage_percent,
                    "estimated": self.estimated,
                    "met": run.overall_coverage_percent >= config.changed_lines_threshold,
                },
                "new_lines": {
                    "required": config.new_lines_threshold,
                },
                "branches": {
                    "required": config.branches_threshold,
                    "actual": run.branch_coverage_percent(),
                    "met": run.branch_coverage_percent().map(|p| p >= config.branches_threshold),
                },
                "min_coverage_percent": config.min_coverage_percent,
                "mcdc_required": config.mcdc_required,
            },
            "mcdc": {
                "satisfied": self.mcdc_satisfied,
                "decisions_total": run.mcdc_records.len(),
                "decisions_satisfied": self.decisions_satisfied,
                "decisions": decisions,
            },
            "top_tests": serde_json::to_value(&self.top_tests)?,
            "gaps": serde_json::to_value(self.gaps)?,
            "stop_history": serde_json::to_value(&run.stop_decisions)?,
            "provenance": self.provenance,
        }))
    }

    fn html(&self) -> HtmlReport {
        let run = self.run;
        let config = self.config;
        let mut sections = Vec::new();

        let mut overview = vec![
            ("Status".to_string(), run.status.to_string()),
            ("Changed-line coverage".to_string(), self.coverage_label()),
            (
                "Changed lines covered".to_string(),
                format!("{} of {}", run.changed_lines_covered, run.changed_lines_total),
            ),
            ("Tests executed".to_string(), run.test_count.to_string()),
            ("Elapsed".to_string(), self.elapsed_label()),
            ("Coverage source".to_string(), self.provenance.to_string()),
        ];
        if let Some(reason) = run.stop_reason {
            overview.push(("Stop reason".to_string(), reason.to_string()));
        }
        if let Some(pct) = run.branch_coverage_percent() {
            overview.push((
                "Branch coverage".to_string(),
                format!("{:.1}% ({}/{})", pct, run.branches_covered, run.branches_total),
            ));
        }
        let mut overview_blocks = vec![HtmlBlock::KeyValues { rows: overview }];
        if self.estimated {
            overview_blocks.push(HtmlBlock::Paragraph {
                text: "Coverage values are estimated: no complete measured signal was supplied."
                    .to_string(),
            });
        }
        sections.push(HtmlSection::new("Overview", overview_blocks));

        sections.push(HtmlSection::new(
            "Thresholds",
            vec![HtmlBlock::Table {
                headers: vec!["Gate".into(), "Required".into(), "Actual".into(), "Met".into()],
                rows: vec![
                    vec![
                        "Changed lines".into(),
                        format!("{:.1}%", config.changed_lines_threshold),
                        self.coverage_label(),
                        Self::mark(run.overall_coverage_percent >= config.changed_lines_threshold)
                            .into(),
                    ],
                    vec![
                        "Branches".into(),
                        format!("{:.1}%", config.branches_threshold),
                        run.branch_coverage_percent()
                            .map(|p| format!("{:.1}%", p))
                            .unwrap_or_else(|| "n/a".into()),
                        run.branch_coverage_percent()
                            .map(|p| Self::mark(p >= config.branches_threshold))
                            .unwrap_or("-")
                            .into(),
                    ],
                    vec![
                        "MC/DC".into(),
                        if config.mcdc_required {
                            "required".into()
                        } else {
                            "optional".into()
                        },
                        format!(
                            "{}/{} decisions",
                            self.decisions_satisfied,
                            run.mcdc_records.len()
                        ),
                        Self::mark(self.mcdc_satisfied || !config.mcdc_required).into(),
                    ],
                ],
            }],
        ));

        if !run.mcdc_records.is_empty() {
            sections.push(HtmlSection::new(
                "MC/DC decisions",
                vec![HtmlBlock::Table {
                    headers: vec![
                        "Decision".into(),
                        "Expression".into(),
                        "Required".into(),
                        "Pending".into(),
                        "Satisfied".into(),
                    ],
                    rows: run
                        .mcdc_records
                        .iter()
                        .map(|r| {
                            let pending: Vec<&str> =
                                r.pending_cases().iter().map(|c| c.test_id.as_str()).collect();
                            vec![
                                r.decision_id.clone(),
                                r.expression.clone(),
                                r.required_cases.len().to_string(),
                                pending.join(", "),
                                Self::mark(r.is_satisfied()).into(),
                            ]
                        })
                        .collect(),
                }],
            ));
        }

        if !self.top_tests.is_empty() {
            sections.push(HtmlSection::new(
                "Most effective tests",
                vec![HtmlBlock::Table {
                    headers: vec![
                        "Test".into(),
                        "Score".into(),
                        "Coverage gain".into(),
                        "New lines".into(),
                        "Time".into(),
                    ],
                    rows: self
                        .top_tests
                        .iter()
                        .map(|t| {
                            vec![
                                format!("{} ({})", t.test_name, t.test_id),
                                format!("{:.1}", t.effectiveness_score),
                                format!("{:+.2}%", t.coverage_delta_percent),
                                t.unique_coverage_lines.to_string(),
                                format!("{}ms", t.execution_time_ms),
                            ]
                        })
                        .collect(),
                }],
            ));
        }

        let gap_block = if self.gaps.is_empty() {
            HtmlBlock::Paragraph {
                text: "No coverage gaps.".into(),
            }
        } else {
            HtmlBlock::Table {
                headers: vec![
                    "Priority".into(),
                    "Location".into(),
                    "Type".into(),
                    "Risk".into(),
                    "Suggested test".into(),
                ],
                rows: self
                    .gaps
                    .iter()
                    .map(|g| {
                        vec![
                            g.priority.to_string(),
                            format!("{}:{}-{}", g.file_path, g.line_start, g.line_end),
                            g.gap_type.to_string(),
                            format!("{:.2}", g.risk_score),
                            g.suggested_test.clone().unwrap_or_default(),
                        ]
                    })
                    .collect(),
            }
        };
        sections.push(HtmlSection::new("Coverage gaps", vec![gap_block]));

        if !run.stop_decisions.is_empty() {
            sections.push(HtmlSection::new(
                "Stop decisions",
                vec![HtmlBlock::Table {
                    headers: vec![
                        "Time".into(),
                        "Decision".into(),
                        "Confidence".into(),
                        "Reason".into(),
                    ],
                    rows: run
                        .stop_decisions
                        .iter()
                        .map(|d| {
                            vec![
                                d.decision_time.format("%Y-%m-%d %H:%M:%S").to_string(),
                                if d.should_stop { "stop" } else { "continue" }.into(),
                                format!("{:.2}", d.confidence_score),
                                d.reason.clone(),
                            ]
                        })
                        .collect(),
                }],
            ));
        }

        HtmlReport {
            title: format!("Coverage report {}", run.run_id),
            status: if self.passed {
                "Passed".into()
            } else {
                "Below threshold".into()
            },
            passed: self.passed,
            sections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coverage::{CoverageEngine, RunContext};

    #[test]
    fn test_report_type_from_str() {
        assert_eq!("JSON".parse::<ReportType>().unwrap(), ReportType::Json);
        assert_eq!("text".parse::<ReportType>().unwrap(), ReportType::Summary);
        assert!(matches!("pdf".parse::<ReportType>(), Err(Error::Report(_))));
    }

    #[test]
    fn test_estimated_coverage_is_labeled() {
        let mut engine = CoverageEngine::new();
        let run = engine.start_coverage(CoverageConfig::default(), RunContext::new());
        engine
            .record_test_execution(&run.run_id, "t1", "login works", 250)
            .unwrap();
        let run = engine.get_run(&run.run_id).unwrap();

        let summary = assemble_report(
            run,
            &[],
            &run.test_effectiveness,
            &run.config,
            ReportType::Summary,
        )
        .unwrap();
        let Report::Summary(text) = summary else {
            panic!("expected summary");
        };
        assert!(text.contains("% (estimated)"));
        assert!(text.contains("login works"));
        assert!(text.contains("BELOW THRESHOLD"));

        let json = assemble_report(run, &[], &run.test_effectiveness, &run.config, ReportType::Json)
            .unwrap();
        let Report::Json(value) = json else {
            panic!("expected json");
        };
        assert_eq!(value["provenance"], "estimated");
        assert_eq!(value["thresholds"]["changed_lines"]["estimated"], true);
        assert_eq!(value["top_tests"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_thresholds_met_respects_mcdc_requirement() {
        let mut engine = CoverageEngine::new();
        let run = engine.start_coverage(CoverageConfig::permissive(), RunContext::new());
        for i in 0..10 {
            engine
                .record_test_execution(&run.run_id, &format!("t{}", i), "t", 100)
                .unwrap();
        }
        let state = engine.get_run(&run.run_id).unwrap();
        assert!(thresholds_met(state, &state.config));
        assert!(!thresholds_met(state, &CoverageConfig::default()));
    }
}
