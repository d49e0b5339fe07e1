//! Config command - View and validate ShareBot configuration
//!
//! Provides the `sharebot config` CLI command which:
//! 1. Shows the effective configuration (file + environment), secrets redacted
//! 2. Validates it and reports every problem at once
//! 3. Prints which configuration file is used

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use sharebot_core::config::{Config, CONFIG_PATH_ENV};
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the effective configuration
    Validate,
    /// Print the configuration file location
    Path,
}

impl ConfigCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(format, config_path),
            ConfigCommand::Validate => execute_validate(format, config_path),
            ConfigCommand::Path => execute_path(format, config_path),
        }
    }
}

fn source_label(config_path: Option<&Path>) -> String {
    match Config::locate(config_path) {
        Some(path) => path.display().to_string(),
        None => "defaults + environment".to_string(),
    }
}

fn execute_show(format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
    let formatter = get_formatter(format);
    let config = Config::resolve(config_path)?.redacted();
    info!(source = %source_label(config_path), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", source_label(config_path)));
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_validate(format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
    let formatter = get_formatter(format);
    let source = source_label(config_path);

    let config = match Config::resolve(config_path) {
        Ok(config) => config,
        Err(e) => {
            if format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": false,
                    "source": source,
                    "errors": [format!("{e:#}")],
                }));
            } else {
                formatter.error(&format!("{e:#}"));
            }
            anyhow::bail!("Configuration could not be loaded");
        }
    };

    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "source": source,
            "errors": error_strings,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.field("Source", &source);
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.field("Source", &source);
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("Configuration is invalid")
    }
}

fn execute_path(format: OutputFormat, config_path: Option<&Path>) -> Result<()> {
    let formatter = get_formatter(format);
    let located = Config::locate(config_path);
    let default = Config::default_path();

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "path": located.as_ref().map(|p| p.display().to_string()),
            "default_path": default.display().to_string(),
            "env_var": CONFIG_PATH_ENV,
        }));
        return Ok(());
    }

    match located {
        Some(path) => formatter.success(&path.display().to_string()),
        None => {
            formatter.warn("No configuration file found; using defaults and environment");
            formatter.field("Default path", &default.display().to_string());
            formatter.field("Override with", &format!("--config or {CONFIG_PATH_ENV}"));
        }
    }
    Ok(())
}
