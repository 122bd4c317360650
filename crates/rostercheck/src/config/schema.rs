use serde::{Deserialize, Serialize};

use crate::classify::ClassificationPolicy;
use crate::model::DEFAULT_MEMBER_IMPACT;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub classification: ClassificationPolicy,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            oracle: OracleConfig::default(),
            dispatch: DispatchConfig::default(),
            classification: ClassificationPolicy::default(),
            ingest: IngestConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Where the validation backend lives and how long calls may take.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_validate_path")]
    pub validate_path: String,
    #[serde(default = "default_extract_path")]
    pub extract_path: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Upper bound for a single validation or extraction call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_validate_path() -> String {
    "/flow1/validate-batch".to_string()
}

fn default_extract_path() -> String {
    "/flow1/ingest-pdf".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            validate_path: default_validate_path(),
            extract_path: default_extract_path(),
            connect_timeout_secs: default_connect_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl OracleConfig {
    /// Base URL without trailing slashes.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn validate_url(&self) -> String {
        join_url(self.base(), &self.validate_path)
    }

    pub fn extract_url(&self) -> String {
        join_url(self.base(), &self.extract_path)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base, path.trim_start_matches('/'))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between consecutive batches of one job. 0 disables it.
    #[serde(default = "default_inter_batch_delay")]
    pub inter_batch_delay_ms: u64,
}

fn default_batch_size() -> usize {
    10
}

fn default_inter_batch_delay() -> u64 {
    100
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            inter_batch_delay_ms: default_inter_batch_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_member_impact")]
    pub default_member_impact: u32,
}

fn default_member_impact() -> u32 {
    DEFAULT_MEMBER_IMPACT
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_member_impact: DEFAULT_MEMBER_IMPACT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}
