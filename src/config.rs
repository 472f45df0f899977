//! Coverage run configuration
//!
//! A `CoverageConfig` is fixed for the lifetime of one run. Three named
//! presets exist (`default`, `strict`, `permissive`); anything else is
//! loaded from YAML or TOML.

use crate::error::{Error, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Thresholds and stop policy inputs for a coverage run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CoverageConfig {
    /// Required coverage of changed lines, in percent (0-100)
    #[serde(default = "default_changed_lines_threshold")]
    pub changed_lines_threshold: f64,

    /// Required coverage of newly added lines, in percent
    #[serde(default = "default_full_threshold")]
    pub new_lines_threshold: f64,

    /// Required branch coverage, in percent
    #[serde(default = "default_full_threshold")]
    pub branches_threshold: f64,

    /// Whether every analyzed decision must reach MC/DC
    #[serde(default = "default_true")]
    pub mcdc_required: bool,

    /// Consecutive tests with < 0.1% gain before declaring a plateau
    #[serde(default = "default_plateau_test_count")]
    pub plateau_test_count: u32,

    /// Wall-clock budget for the run (cooperative, checked on stop evaluation)
    #[serde(default = "default_time_limit_minutes")]
    pub time_limit_minutes: u32,

    /// Floor below which a completed run is reported as failing
    #[serde(default = "default_changed_lines_threshold")]
    pub min_coverage_percent: f64,

    /// Hard cap on executed tests
    #[serde(default = "default_max_tests")]
    pub max_tests: u32,

    /// Globs for files whose gaps are always CRITICAL
    #[serde(default = "default_critical_patterns")]
    pub critical_file_patterns: Vec<String>,

    /// Globs for files ignored when attaching a diff
    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    /// Decisions with more conditions than this are not analyzed (2^n rows)
    #[serde(default = "default_mcdc_max_conditions")]
    pub mcdc_max_conditions: usize,
}

fn default_changed_lines_threshold() -> f64 {
    80.0
}

fn default_full_threshold() -> f64 {
    100.0
}

fn default_true() -> bool {
    true
}

fn default_plateau_test_count() -> u32 {
    5
}

fn default_time_limit_minutes() -> u32 {
    30
}

fn default_max_tests() -> u32 {
    100
}

fn default_mcdc_max_conditions() -> usize {
    8
}

fn default_critical_patterns() -> Vec<String> {
    vec![
        "**/auth/**".to_string(),
        "**/payment/**".to_string(),
        "**/security/**".to_string(),
    ]
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/tests/**".to_string(),
        "**/*_test.*".to_string(),
        "**/test_*".to_string(),
    ]
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            changed_lines_threshold: default_changed_lines_threshold(),
            new_lines_threshold: default_full_threshold(),
            branches_threshold: default_full_threshold(),
            mcdc_required: true,
            plateau_test_count: default_plateau_test_count(),
            time_limit_minutes: default_time_limit_minutes(),
            min_coverage_percent: default_changed_lines_threshold(),
            max_tests: default_max_tests(),
            critical_file_patterns: default_critical_patterns(),
            exclude_patterns: default_exclude_patterns(),
            mcdc_max_conditions: default_mcdc_max_conditions(),
        }
    }
}

/// Names accepted by [`CoverageConfig::preset`]
pub const PRESET_NAMES: [&str; 3] = ["default", "strict", "permissive"];

impl CoverageConfig {
    /// 100% on every threshold, MC/DC required
    pub fn strict() -> Self {
        Self {
            changed_lines_threshold: 100.0,
            new_lines_threshold: 100.0,
            branches_threshold: 100.0,
            mcdc_required: true,
            min_coverage_percent: 100.0,
            ..Self::default()
        }
    }

    /// 50% changed lines, 70% new lines and branches, MC/DC optional
    pub fn permissive() -> Self {
        Self {
            changed_lines_threshold: 50.0,
            new_lines_threshold: 70.0,
            branches_threshold: 70.0,
            mcdc_required: false,
            min_coverage_percent: 50.0,
            ..Self::default()
        }
    }

    /// Look up a named preset
    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "default" => Some(Self::default()),
            "strict" => Some(Self::strict()),
            "permissive" => Some(Self::permissive()),
            _ => None,
        }
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_norway::from_str(yaml).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_norway::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load from a `.yaml`/`.yml` or `.toml` file
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_yaml(&content),
        }
    }

    /// Resolve either a preset name or a config file path
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        if let Some(config) = Self::preset(name_or_path) {
            return Ok(config);
        }
        let path = Path::new(name_or_path);
        if path.exists() {
            Self::from_path(path)
        } else {
            Err(Error::Config(format!(
                "'{}' is neither a preset ({}) nor an existing file",
                name_or_path,
                PRESET_NAMES.join(", ")
            )))
        }
    }

    pub fn is_critical(&self, file_path: &str) -> bool {
        matches_any(&self.critical_file_patterns, file_path)
    }

    pub fn is_excluded(&self, file_path: &str) -> bool {
        matches_any(&self.exclude_patterns, file_path)
    }
}

fn matches_any(patterns: &[String], file_path: &str) -> bool {
    let path = file_path.trim_start_matches("./");
    patterns.iter().any(|p| glob_match::glob_match(p, path))
}
