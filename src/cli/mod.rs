//! CLI command implementations
//!
//! - `analyze`: single-expression and whole-file MC/DC analysis
//! - `run`: replay a recorded test feed through a coverage run
//! - `config`: presets, config validation and JSON schemas
//! - `util`: shared argument and output helpers

pub mod analyze;
pub mod config;
pub mod run;
pub mod util;

pub use analyze::{cmd_analyze, cmd_analyze_file};
pub use config::{cmd_config, cmd_schema, cmd_validate_config};
pub use run::cmd_run;
