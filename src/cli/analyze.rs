//! MC/DC analysis commands

use super::util::{flag_value, has_flag, mcdc_options, parse_flag, parse_output_arg, write_output};
use mcdc_gate::*;
use std::fs;

pub fn cmd_analyze(args: &[String]) -> Result<()> {
    let Some(expression) = args.first().filter(|a| !a.starts_with("--")) else {
        return Err("Usage: mcdc-gate analyze <expression> [--file F] [--line N] [--json]".into());
    };

    let file = flag_value(args, "--file").unwrap_or("<input>");
    let line: usize = parse_flag(args, "--line")?.unwrap_or(1);
    let analyzer = McdcAnalyzer::with_options(mcdc_options(args, McdcOptions::default())?);
    let result = analyzer.analyze(expression, file, line);

    let output = if has_flag(args, "--json") {
        serde_json::to_string_pretty(&result)?
    } else {
        result.to_report()
    };
    write_output(&parse_output_arg(args), &output)?;

    if result.is_achievable {
        Ok(())
    } else {
        Err(Error::Other(
            result
                .reason
                .unwrap_or_else(|| "MC/DC not achievable".to_string()),
        ))
    }
}

pub fn cmd_analyze_file(args: &[String]) -> Result<()> {
    let Some(path) = args.first().filter(|a| !a.starts_with("--")) else {
        return Err("Usage: mcdc-gate analyze-file <path> [--lang L] [--json]".into());
    };

    let language = match flag_value(args, "--lang") {
        Some(lang) => lang.parse::<Language>()?,
        None => detect_language(path).ok_or_else(|| {
            Error::UnsupportedLanguage(format!("cannot detect language of {}", path))
        })?,
    };
    let code = fs::read_to_string(path)?;
    let analyzer = McdcAnalyzer::with_options(mcdc_options(args, McdcOptions::default())?);
    let results = analyze_file_with(&analyzer, path, &code, language)?;

    let output = if has_flag(args, "--json") {
        serde_json::to_string_pretty(&results)?
    } else {
        let mut out = String::new();
        for result in &results {
            out.push_str(&result.to_report());
            out.push('\n');
        }
        let achievable = results.iter().filter(|r| r.is_achievable).count();
        let tests: usize = results.iter().map(|r| r.minimum_test_count).sum();
        out.push_str(&format!(
            "{} decision(s), {} achievable, {} MC/DC test(s) required\n",
            results.len(),
            achievable,
            tests
        ));
        out
    };
    write_output(&parse_output_arg(args), &output)
}
