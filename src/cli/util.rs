//! CLI utility helpers

use mcdc_gate::config_validate::MAX_CONDITIONS_CAP;
use mcdc_gate::{Error, ExtractionMode, McdcOptions, Result};
use std::fs;
use std::path::PathBuf;

/// Value following `flag`, if present
pub fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// Every value following a repeated `flag`
pub fn flag_values<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| *a == flag)
        .filter_map(|(i, _)| args.get(i + 1))
        .map(String::as_str)
        .collect()
}

pub fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Parse a numeric flag value, failing on garbage
pub fn parse_flag<T: std::str::FromStr>(args: &[String], flag: &str) -> Result<Option<T>> {
    match flag_value(args, flag) {
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| Error::Other(format!("Invalid value for {}: {}", flag, v))),
        None => Ok(None),
    }
}

/// `--max-conditions`, `--structured` and `--legacy` on top of `base`
pub fn mcdc_options(args: &[String], base: McdcOptions) -> Result<McdcOptions> {
    let mut options = base;
    if let Some(max) = parse_flag::<usize>(args, "--max-conditions")? {
        if max == 0 || max > MAX_CONDITIONS_CAP {
            return Err(Error::Other(format!(
                "--max-conditions must be between 1 and {}, got {}",
                MAX_CONDITIONS_CAP, max
            )));
        }
        options.max_conditions = max;
    }
    if has_flag(args, "--structured") {
        options.extraction = ExtractionMode::Structured;
    }
    if has_flag(args, "--legacy") {
        options.legacy_achievability = true;
    }
    Ok(options)
}

/// Parse --output argument to determine output file path
pub fn parse_output_arg(args: &[String]) -> Option<PathBuf> {
    flag_value(args, "--output")
        .or_else(|| flag_value(args, "-o"))
        .map(PathBuf::from)
}

/// Write content to file or stdout
pub fn write_output(path: &Option<PathBuf>, content: &str) -> Result<()> {
    match path {
        Some(p) => {
            fs::write(p, content).map_err(Error::Io)?;
            eprintln!("Written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_flag_helpers() {
        let a = args(&["feed.json", "--analyze", "a.rs", "--analyze", "b.py", "--json"]);
        assert_eq!(flag_value(&a, "--analyze"), Some("a.rs"));
        assert_eq!(flag_values(&a, "--analyze"), vec!["a.rs", "b.py"]);
        assert!(has_flag(&a, "--json"));
        assert_eq!(flag_value(&a, "--json"), None);
    }

    #[test]
    fn test_mcdc_options_flags() {
        let a = args(&["x", "--max-conditions", "4", "--structured"]);
        let options = mcdc_options(&a, McdcOptions::default()).unwrap();
        assert_eq!(options.max_conditions, 4);
        assert_eq!(options.extraction, ExtractionMode::Structured);
        assert!(!options.legacy_achievability);

        let bad = args(&["x", "--max-conditions", "many"]);
        assert!(mcdc_options(&bad, McdcOptions::default()).is_err());

        for out_of_range in ["0", "17", "64"] {
            let a = args(&["x", "--max-conditions", out_of_range]);
            assert!(mcdc_options(&a, McdcOptions::default()).is_err());
        }
        let at_cap = args(&["x", "--max-conditions", "16"]);
        assert_eq!(mcdc_options(&at_cap, McdcOptions::default()).unwrap().max_conditions, 16);
    }
}
