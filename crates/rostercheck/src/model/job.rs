//! Upload jobs and the provider rows they own.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::report::{ProviderReport, RawFields};

/// Status of an upload job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the provider records of a job came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Tabular,
    Archive,
}

/// One provider record within a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRow {
    /// Position within the job; part of the provider's composite id.
    pub index: usize,
    pub raw_fields: RawFields,
    /// Set together with `report`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ProviderReport>,
}

impl ProviderRow {
    pub fn new(index: usize, raw_fields: RawFields) -> Self {
        Self {
            index,
            raw_fields,
            confidence: None,
            report: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.report.is_some()
    }
}

/// One ingestion-and-validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadJob {
    pub id: String,
    pub filename: String,
    pub source_kind: SourceKind,
    pub total_count: usize,
    pub processed_count: usize,
    pub validated_count: usize,
    pub flagged_count: usize,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub eta_seconds: Option<u64>,
    pub avg_confidence: Option<f64>,
    pub rows: Vec<ProviderRow>,
}

impl UploadJob {
    pub(crate) fn new(filename: &str, source_kind: SourceKind, rows: Vec<ProviderRow>) -> Self {
        Self {
            id: new_job_id(),
            filename: filename.to_string(),
            source_kind,
            total_count: rows.len(),
            processed_count: 0,
            validated_count: 0,
            flagged_count: 0,
            status: JobStatus::Processing,
            started_at: Utc::now(),
            finished_at: None,
            last_error: None,
            eta_seconds: None,
            avg_confidence: None,
            rows,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Timestamp used to order finished jobs, newest last.
    pub fn recency(&self) -> DateTime<Utc> {
        self.finished_at.unwrap_or(self.started_at)
    }

    pub fn summary(&self) -> JobSummary {
        JobSummary {
            id: self.id.clone(),
            filename: self.filename.clone(),
            source_kind: self.source_kind,
            total_count: self.total_count,
            processed_count: self.processed_count,
            validated_count: self.validated_count,
            flagged_count: self.flagged_count,
            status: self.status,
            started_at: self.started_at,
            finished_at: self.finished_at,
            last_error: self.last_error.clone(),
            eta_seconds: self.eta_seconds,
            avg_confidence: self.avg_confidence,
        }
    }
}

/// Job record without its rows, as returned by listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: String,
    pub filename: String,
    pub source_kind: SourceKind,
    pub total_count: usize,
    pub processed_count: usize,
    pub validated_count: usize,
    pub flagged_count: usize,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub eta_seconds: Option<u64>,
    pub avg_confidence: Option<f64>,
}

fn new_job_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("upload-{}-{}", Utc::now().timestamp_millis(), &suffix[..8])
}
