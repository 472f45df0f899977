//! Error types for mcdc-gate
//!
//! Only run-lifecycle misuse and I/O surface as `Err`. Parse and evaluation
//! problems inside a decision are carried as data on `McdcResult`.

use crate::coverage::RunStatus;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// mcdc-gate errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("coverage not started for run '{0}'")]
    CoverageNotStarted(String),

    #[error("run '{run_id}' is already finalized ({status})")]
    RunFinalized { run_id: String, status: RunStatus },

    #[error("Code parse error: {0}")]
    CodeParse(String),

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Report error: {0}")]
    Report(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
