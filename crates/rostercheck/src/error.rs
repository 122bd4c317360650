use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Failures of a remote validation or extraction call.
///
/// The `Display` text is what a failed job carries in `last_error`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Backend request failed: {0}")]
    Http(String),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode backend response: {0}")]
    Decode(String),

    #[error("Backend call timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("No providers extracted from archive")]
    EmptyExtraction,

    #[error("Report count mismatch: expected {expected}, got {got}")]
    ReportCountMismatch { expected: usize, got: usize },
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read upload '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Upload is not valid UTF-8 text")]
    InvalidUtf8,

    #[error("Failed to read tabular upload: {0}")]
    Csv(String),
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::Csv(err.to_string())
    }
}

/// A lookup that did not resolve. Every variant is a not-found result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Malformed provider id '{0}'")]
    MalformedId(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Provider {index} not found in job {job_id}")]
    RowNotFound { job_id: String, index: usize },

    #[error("Provider {index} in job {job_id} has not been processed yet")]
    NotProcessed { job_id: String, index: usize },
}

pub type Result<T> = std::result::Result<T, RosterError>;
