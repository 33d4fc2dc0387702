//! Config command - Inspect the effective dropsync configuration
//!
//! Provides the `dropsync config` CLI command which:
//! 1. Shows the merged configuration (file, `.env`, environment) with
//!    secrets masked, as YAML or JSON
//! 2. Validates it and reports every problem found

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use dropsync_core::config::Config;

use crate::output::{get_formatter, OutputFormat};

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration (secrets masked)
    Show,
    /// Validate the effective configuration
    Validate,
}

impl ConfigCommand {
    /// Execute the config command
    pub fn execute(&self, config: &Config, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config, format),
            ConfigCommand::Validate => execute_validate(config, format),
        }
    }
}

fn execute_show(config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let redacted = config.redacted();

    if format.is_json() {
        let json = serde_json::to_value(&redacted)
            .context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success("Effective configuration");
        formatter.info("");

        let yaml =
            serde_yaml::to_string(&redacted).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }

    Ok(())
}

fn execute_validate(config: &Config, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);

    info!("Validating configuration");
    let errors = config.validate();

    if format.is_json() {
        let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        let json = serde_json::json!({
            "valid": errors.is_empty(),
            "errors": error_strings,
        });
        formatter.print_json(&json);
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        anyhow::bail!("configuration is invalid")
    }
}
