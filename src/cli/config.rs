//! Config and schema CLI commands

use super::util::has_flag;
use mcdc_gate::*;
use std::path::Path;

pub fn cmd_config(args: &[String]) -> Result<()> {
    let name = args.first().map(|s| s.as_str()).unwrap_or("default");
    let config = CoverageConfig::preset(name).ok_or_else(|| {
        Error::Config(format!(
            "Unknown preset '{}' (available: {})",
            name,
            PRESET_NAMES.join(", ")
        ))
    })?;
    print!("{}", config.to_yaml()?);
    Ok(())
}

pub fn cmd_validate_config(args: &[String]) -> Result<()> {
    let Some(path) = args.first() else {
        return Err("Usage: mcdc-gate validate-config <config.yaml|config.toml> [--json]".into());
    };

    let config = CoverageConfig::from_path(Path::new(path))?;
    let result = config.validate();

    if has_flag(args, "--json") {
        let output = serde_json::json!({
            "valid": !result.has_errors(),
            "errors": result.error_count(),
            "warnings": result.warning_count(),
            "issues": result.issues,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print!("{}", result.to_report());
    }

    if result.has_errors() {
        Err(Error::Config(format!(
            "{} has {} error(s)",
            path,
            result.error_count()
        )))
    } else {
        Ok(())
    }
}

pub fn cmd_schema(args: &[String]) -> Result<()> {
    let schema_name = args.first().map(|s| s.as_str()).unwrap_or("list");

    match schema_name {
        "list" => {
            println!("Available schemas: config, mcdc, options");
            Ok(())
        }
        "config" => print_schema::<CoverageConfig>(),
        "mcdc" => print_schema::<McdcResult>(),
        "options" => print_schema::<McdcOptions>(),
        _ => Err(format!("Unknown schema: {}", schema_name).into()),
    }
}

fn print_schema<T: schemars::JsonSchema>() -> Result<()> {
    let schema = schemars::schema_for!(T);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}
