//! Config validation for coverage runs
//!
//! Checks a `CoverageConfig` for values that would make the stop policy or
//! the MC/DC analysis misbehave.

use crate::config::CoverageConfig;
use serde::Serialize;

/// Hard upper bound on `mcdc_max_conditions` (2^16 truth-table rows)
pub const MAX_CONDITIONS_CAP: usize = 16;

/// Severity level for validation issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Error,
    Warning,
}

/// A validation issue found in config
#[derive(Debug, Clone, Serialize)]
pub struct ConfigIssue {
    pub severity: Severity,
    pub code: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            severity: Severity::Error,
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn warning(code: &str, message: &str) -> Self {
        Self {
            severity: Severity::Warning,
            code: code.to_string(),
            message: message.to_string(),
        }
    }
}

/// Result of config validation
#[derive(Debug, Default, Serialize)]
pub struct ConfigValidationResult {
    pub issues: Vec<ConfigIssue>,
}

impl ConfigValidationResult {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn has_warnings(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Format as human-readable report
    pub fn to_report(&self) -> String {
        if self.issues.is_empty() {
            return "✓ Config is valid\n".to_string();
        }
        let mut out = String::new();
        for issue in &self.issues {
            let tag = match issue.severity {
                Severity::Error => "ERROR",
                Severity::Warning => "WARN",
            };
            out.push_str(&format!("{} [{}] {}\n", tag, issue.code, issue.message));
        }
        out.push_str(&format!(
            "\n{} error(s), {} warning(s)\n",
            self.error_count(),
            self.warning_count()
        ));
        out
    }
}

impl CoverageConfig {
    /// Validate thresholds, counters and glob patterns
    pub fn validate(&self) -> ConfigValidationResult {
        let mut result = ConfigValidationResult::default();

        for (name, value) in [
            ("changed_lines_threshold", self.changed_lines_threshold),
            ("new_lines_threshold", self.new_lines_threshold),
            ("branches_threshold", self.branches_threshold),
            ("min_coverage_percent", self.min_coverage_percent),
        ] {
            if !(0.0..=100.0).contains(&value) || value.is_nan() {
                result.issues.push(ConfigIssue::error(
                    "E001",
                    &format!("{} must be within 0-100, got {}", name, value),
                ));
            }
        }

        if self.mcdc_max_conditions == 0 || self.mcdc_max_conditions > MAX_CONDITIONS_CAP {
            result.issues.push(ConfigIssue::error(
                "E002",
                &format!(
                    "mcdc_max_conditions must be within 1-{}, got {}",
                    MAX_CONDITIONS_CAP, self.mcdc_max_conditions
                ),
            ));
        }

        for (name, value) in [
            ("plateau_test_count", self.plateau_test_count),
            ("max_tests", self.max_tests),
            ("time_limit_minutes", self.time_limit_minutes),
        ] {
            if value == 0 {
                result.issues.push(ConfigIssue::warning(
                    "W001",
                    &format!("{} is 0; the run stops on the first evaluation", name),
                ));
            }
        }

        if self.min_coverage_percent > self.changed_lines_threshold {
            result.issues.push(ConfigIssue::warning(
                "W002",
                "min_coverage_percent is above changed_lines_threshold; threshold stops will still report failure",
            ));
        }

        for pattern in self
            .critical_file_patterns
            .iter()
            .chain(self.exclude_patterns.iter())
        {
            if let Some(problem) = glob_problem(pattern) {
                result.issues.push(ConfigIssue::error(
                    "E003",
                    &format!("invalid glob '{}': {}", pattern, problem),
                ));
            }
        }

        result
    }
}

/// glob-match never fails, so catch the obvious malformed shapes here
fn glob_problem(pattern: &str) -> Option<&'static str> {
    if pattern.trim().is_empty() {
        return Some("empty pattern");
    }
    let mut brackets = 0i32;
    let mut braces = 0i32;
    for c in pattern.chars() {
        match c {
            '[' => brackets += 1,
            ']' => brackets -= 1,
            '{' => braces += 1,
            '}' => braces -= 1,
            _ => {}
        }
        if brackets < 0 || braces < 0 {
            return Some("unbalanced brackets");
        }
    }
    if brackets != 0 || braces != 0 {
        return Some("unbalanced brackets");
    }
    None
}
