use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../schema/config-v1.json");

pub const ENV_ORACLE_URL: &str = "ROSTERCHECK_ORACLE_URL";
pub const ENV_BATCH_SIZE: &str = "ROSTERCHECK_BATCH_SIZE";

/// `<config dir>/rostercheck/config.json`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("rostercheck").join("config.json"))
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let mut config: Config = serde_json::from_value(json_value)?;

    apply_env_overrides(&mut config)?;
    validate_config(&config)?;

    Ok(config)
}

/// Applies `ROSTERCHECK_*` environment variables on top of a loaded config.
pub fn apply_env_overrides(config: &mut Config) -> Result<(), ConfigError> {
    if let Ok(url) = std::env::var(ENV_ORACLE_URL) {
        log::debug!("Oracle URL overridden from {}", ENV_ORACLE_URL);
        config.oracle.base_url = url;
    }

    if let Ok(raw) = std::env::var(ENV_BATCH_SIZE) {
        let batch_size = raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::Validation {
                message: format!("{} must be a positive integer, got '{}'", ENV_BATCH_SIZE, raw),
            })?;
        config.dispatch.batch_size = batch_size;
    }

    Ok(())
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let validator = jsonschema::validator_for(&schema).map_err(|e| ConfigError::Validation {
        message: format!("Failed to compile JSON schema: {}", e),
    })?;

    let error_messages: Vec<String> = validator
        .iter_errors(json_value)
        .map(|e| e.to_string())
        .collect();
    if !error_messages.is_empty() {
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.oracle.base().trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "oracle.base_url must not be empty".to_string(),
        });
    }

    if config.dispatch.batch_size == 0 {
        return Err(ConfigError::Validation {
            message: "dispatch.batch_size must be at least 1".to_string(),
        });
    }

    config
        .classification
        .validate()
        .map_err(|message| ConfigError::Validation { message })?;

    Ok(())
}
