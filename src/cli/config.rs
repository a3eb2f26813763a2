//! Config command handlers.

use std::path::Path;

use anyhow::{Context, Result};

use sqlmatic::config::validate::{validate_config, DiagnosticLevel};
use sqlmatic::config::Config;

use super::ConfigAction;

pub(crate) async fn cmd_config(config_path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check => check(config_path),
        ConfigAction::Show => {
            let config = Config::load_from_path(config_path)
                .with_context(|| format!("Failed to load {}", config_path.display()))?;
            println!("# {}", config_path.display());
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigAction::Init { force } => {
            if config_path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    config_path.display()
                );
            }
            Config::default()
                .save_to_path(config_path)
                .with_context(|| format!("Failed to write {}", config_path.display()))?;
            println!("Wrote default config to {}", config_path.display());
            Ok(())
        }
    }
}

/// Validate the config file: known fields, types and value ranges.
fn check(config_path: &Path) -> Result<()> {
    println!("Config file: {}", config_path.display());

    if !config_path.exists() {
        println!("[OK] No config file found (using defaults)");
        return Ok(());
    }

    let content = std::fs::read_to_string(config_path).context("Failed to read config file")?;

    let raw: serde_json::Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            println!("[ERROR] Invalid JSON: {}", e);
            return Ok(());
        }
    };

    let diagnostics = validate_config(&raw);
    for diag in &diagnostics {
        println!("{}", diag);
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Error)
        .count();
    let warnings = diagnostics
        .iter()
        .filter(|d| d.level == DiagnosticLevel::Warn)
        .count();

    if errors == 0 && warnings == 0 {
        println!("\nConfiguration looks good!");
    } else {
        println!("\nFound {} error(s), {} warning(s)", errors, warnings);
    }
    Ok(())
}
