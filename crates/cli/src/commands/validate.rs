//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{CommitMode, DispatcherBlueprint, SinkType};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::commands::load_config;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    overrides: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    events_table: String,
    offsets_table: String,
    sink: String,
    topic: String,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    match load_config(&args.config) {
        Ok(loaded) => {
            let blueprint = &loaded.blueprint;
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: collect_warnings(blueprint),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    events_table: blueprint.event_store.events_table.clone(),
                    offsets_table: blueprint.event_store.offsets_table.clone(),
                    sink: format!("{} ({:?})", blueprint.sink.name, blueprint.sink.sink_type),
                    topic: blueprint.sink.topic.clone(),
                }),
                overrides: loaded.overrides,
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("{e:#}")),
            overrides: Vec::new(),
            warnings: Vec::new(),
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &DispatcherBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sink.sink_type == SinkType::Memory {
        warnings.push("Memory sink keeps batches in process - nothing leaves the dispatcher".to_string());
    }

    if blueprint.event_store.commit_mode == CommitMode::Unconditional {
        warnings.push(
            "Unconditional offset commits can move an offset backwards under concurrent invocations"
                .to_string(),
        );
    }

    if blueprint.runner.max_redeliveries == 0 {
        warnings.push("runner.max_redeliveries is 0 - transient failures are not retried".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Events table: {}", summary.events_table);
            println!("  Offsets table: {}", summary.offsets_table);
            println!("  Sink: {}", summary.sink);
            println!("  Topic: {}", summary.topic);
        }

        if !result.overrides.is_empty() {
            println!("\n  Environment overrides: {}", result.overrides.join(", "));
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config_reports_warnings() {
        let file = write_config(
            r#"
[event_store]
events_table = "events"
offsets_table = "offsets"

[sink]
name = "mem"
sink_type = "memory"
topic = "out"
"#,
        );
        let result = validate_config(&ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        });
        assert!(result.valid, "{:?}", result.error);
        assert_eq!(result.warnings.len(), 2);
    }

    #[test]
    fn test_missing_file_is_invalid() {
        let result = validate_config(&ValidateArgs {
            config: "does-not-exist.toml".into(),
            json: false,
        });
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("not found"));
    }
}
