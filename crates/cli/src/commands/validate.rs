//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::RelayConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::error::CliError;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    topic: String,
    endpoint_count: usize,
    worker_count: usize,
    asset_count: usize,
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

    match result.error {
        None => Ok(()),
        Some(error) => Err(CliError::config_validation(error).into()),
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            error: Some(format!("File not found: {}", config_path)),
            config_path,
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    topic: config.broker.topic.clone(),
                    endpoint_count: config.bulk.endpoints.len(),
                    worker_count: config.workers.count,
                    asset_count: config.assets.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &RelayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.assets.is_empty() {
        warnings.push(
            "No assets configured - alert resources fall back to the destination address"
                .to_string(),
        );
    }

    if config.workers.flush_interval_secs < config.workers.report_interval_secs {
        warnings.push(format!(
            "workers.flush_interval_secs ({}) is shorter than report_interval_secs ({}) - \
             reported alert counts are reset before they are printed",
            config.workers.flush_interval_secs, config.workers.report_interval_secs
        ));
    }

    if !config.bulk.verify_on_start {
        warnings.push("bulk.verify_on_start is disabled - unreachable endpoints surface only as bulk errors".to_string());
    }

    if config.alert.request_timeout_secs > config.workers.flush_interval_secs {
        warnings.push(format!(
            "alert.request_timeout_secs ({}) is longer than the flush interval ({}s)",
            config.alert.request_timeout_secs, config.workers.flush_interval_secs
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Topic: {}", summary.topic);
            println!("  Bulk endpoints: {}", summary.endpoint_count);
            println!("  Workers: {}", summary.worker_count);
            println!("  Assets: {}", summary.asset_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
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
    fn test_valid_config() {
        let file = write_config("[broker]\ntopic = \"eve\"\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: true,
        };
        let result = validate_config(&args);
        assert!(result.valid);
        assert_eq!(result.summary.unwrap().topic, "eve");
        run_validate(&args).unwrap();
    }

    #[test]
    fn test_invalid_config() {
        let file = write_config("[workers]\ncount = 0\n");
        let args = ValidateArgs {
            config: file.path().to_path_buf(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("workers.count"));
        assert!(run_validate(&args).is_err());
    }

    #[test]
    fn test_missing_file() {
        let args = ValidateArgs {
            config: "does/not/exist.toml".into(),
            json: false,
        };
        assert!(!validate_config(&args).valid);
    }

    #[test]
    fn test_warnings() {
        let mut config = RelayConfig::default();
        assert!(collect_warnings(&config).is_empty());

        config.assets.clear();
        config.workers.flush_interval_secs = 2;
        let warnings = collect_warnings(&config);
        assert_eq!(warnings.len(), 3);
    }
}
