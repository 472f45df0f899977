// Production-quality lints
#![warn(
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
// Deny truly dangerous patterns
#![deny(clippy::mem_forget)]
// Allow common patterns in library code
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! # mcdc-gate — MC/DC analysis and coverage-run gating
//!
//! Two engines that share one crate:
//!
//! - **MC/DC analysis**: a boolean decision is normalized, split into
//!   conditions, enumerated into a truth table and searched for independence
//!   pairs, producing the minimum test set for Modified Condition/Decision
//!   Coverage.
//! - **Coverage runs**: a session that consumes per-test effectiveness
//!   signals against a changed-code diff and answers "should testing stop?"
//!   with a reason and a confidence score.
//!
//! ## Quick Start
//!
//! ```rust
//! use mcdc_gate::{analyze_decision, CoverageConfig, CoverageEngine, ReportType, RunContext};
//!
//! let result = analyze_decision("user.active && !user.locked", "src/auth.rs", 42);
//! assert!(result.is_achievable);
//! assert_eq!(result.minimum_test_count, 3);
//!
//! let mut engine = CoverageEngine::new();
//! let run = engine.start_coverage(CoverageConfig::permissive(), RunContext::new());
//! engine.record_mcdc_analysis(&run.run_id, &result)?;
//! engine.record_test_execution(&run.run_id, "t1", "active user logs in", 120)?;
//!
//! let decision = engine.should_stop_testing(&run.run_id)?;
//! assert!(!decision.should_stop);
//!
//! let report = engine.generate_report(&run.run_id, ReportType::Summary)?;
//! assert!(report.render()?.contains("(estimated)"));
//! # Ok::<(), mcdc_gate::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                                                              │
//! │  SOURCE / EXPRESSION                                         │
//! │       │                                                      │
//! │       ├──► analyze_file(path, code, lang) ──► [McdcResult]   │
//! │       └──► analyze_decision(expr, path, line) ──► McdcResult │
//! │                                                              │
//! │  DIFF + TEST FEED                                            │
//! │       │                                                      │
//! │       ├──► CoverageEngine::start_coverage ──► CoverageRun    │
//! │       ├──► record_* / should_stop_testing ──► StopDecision   │
//! │       ├──► identify_coverage_gaps ──► [CoverageGap]          │
//! │       └──► generate_report ──► Report (summary/json/html)    │
//! │                                                              │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod config_validate;
pub mod coverage;
pub mod diff;
pub mod error;
pub mod mcdc;
pub mod parse;
pub mod report;

pub use config::{CoverageConfig, PRESET_NAMES};
pub use config_validate::{ConfigIssue, ConfigValidationResult, Severity};
pub use coverage::{
    Clock, CoverageEngine, CoverageGap, CoverageReading, CoverageRun, CoverageSnapshot,
    GapPriority, GapType, ManualClock, Provenance, RunContext, RunStatus, StopDecision,
    StopReason, SystemClock, TestEffectiveness, TestExecution,
};
pub use diff::{parse_unified_diff, ChangedFile, LineRange};
pub use error::{Error, Result};
pub use mcdc::{
    analyze_decision, Condition, Decision, ExtractionMode, McdcAnalyzer, McdcOptions, McdcResult,
    McdcTestCase, TruthTableRow,
};
pub use parse::{analyze_file, analyze_file_with, detect_language, extract_decisions, Language};
pub use report::{assemble_report, thresholds_met, HtmlReport, Report, ReportType};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
