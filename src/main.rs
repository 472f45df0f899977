//! mcdc-gate CLI - Command-line interface
//!
//! Commands:
//!   analyze         - MC/DC analysis of one decision expression
//!   analyze-file    - MC/DC analysis of every decision in a source file
//!   run             - Replay a test feed through a coverage run
//!   config          - Print a config preset
//!   validate-config - Check a config file
//!   schema          - Print JSON schemas

mod cli;

use mcdc_gate::{Result, VERSION};
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> ExitCode {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        return ExitCode::from(1);
    }

    let result: Result<()> = match args[1].as_str() {
        "analyze" => cli::cmd_analyze(&args[2..]),
        "analyze-file" => cli::cmd_analyze_file(&args[2..]),
        "run" => cli::cmd_run(&args[2..]),
        "config" => cli::cmd_config(&args[2..]),
        "validate-config" => cli::cmd_validate_config(&args[2..]),
        "schema" => cli::cmd_schema(&args[2..]),
        "version" | "--version" | "-v" => {
            println!("mcdc-gate {}", VERSION);
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        cmd => {
            eprintln!("Unknown command: {}", cmd);
            print_usage();
            Err("Unknown command".into())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::from(1)
        }
    }
}

/// Logs go to stderr so report output on stdout stays parseable
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_usage() {
    println!(
        r#"
mcdc-gate - MC/DC decision analysis and coverage-run gating

USAGE:
    mcdc-gate <COMMAND> [OPTIONS]

COMMANDS:
    analyze <expr>                  Analyze one boolean decision
    analyze-file <path>             Analyze every decision in a source file
    run <feed.json>                 Replay a test feed through a coverage run
    config [preset]                 Print a preset (default, strict, permissive) as YAML
    validate-config <path>          Check a YAML/TOML coverage config
    schema [name]                   Print JSON schema (config, mcdc, options)
    version                         Print version

OPTIONS:
    --file <path> --line <n>        Decision location (analyze)
    --lang <rust|typescript|python|go|java|csharp>
                                    Source language (analyze-file; default: by extension)
    --max-conditions <n>            Complexity bound (default: 8)
    --structured                    Parenthesis-aware condition extraction
    --legacy                        Only the complexity bound makes a decision unachievable
    --config <preset|path>          Coverage config (run; default: default)
    --diff <file.diff>              Unified diff of the change under test (run)
    --analyze <src>                 Record MC/DC obligations from a source file (run, repeatable)
    --branch <name> --pr <url>      Run context (run)
    --stop                          End the run as STOPPED instead of COMPLETED (run)
    --report <summary|json|html>    Report shape (run; default: summary)
    --output <file>                 Output file (default: stdout)
    --json                          JSON output (analyze, analyze-file, validate-config)

ENVIRONMENT:
    RUST_LOG                        Log filter (default: info)

EXIT CODES:
    0  success; for run, every threshold met
    1  error, unachievable decision, or run below threshold

EXAMPLES:
    mcdc-gate analyze "user.active && !user.locked"
    mcdc-gate analyze-file src/auth/login.py --json
    git diff main > change.diff
    mcdc-gate run feed.json --diff change.diff --analyze src/auth/login.py --report html -o report.html
"#
    );
}
