//! Read-only views derived from the store on every call: flagged providers,
//! single-provider lookup, the review queue and dashboard aggregates.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::LookupError;
use crate::model::{
    JobStatus, PriorityLevel, ProviderInput, ProviderOutput, ProviderReport, ProviderRow,
    UploadJob,
};
use crate::store::JobStore;

/// Reason attached to flagged rows whose report carries none.
pub const NEEDS_REVIEW: &str = "Needs review";

const ID_SEPARATOR: &str = "::";

/// Composite id `"{job_id}::{row_index}"`.
pub fn provider_id(job_id: &str, index: usize) -> String {
    format!("{}{}{}", job_id, ID_SEPARATOR, index)
}

/// Splits a composite id on its last separator.
pub fn parse_provider_id(id: &str) -> Result<(&str, usize), LookupError> {
    let malformed = || LookupError::MalformedId(id.to_string());
    let (job_id, index) = id.rsplit_once(ID_SEPARATOR).ok_or_else(malformed)?;
    if job_id.is_empty() {
        return Err(malformed());
    }
    let index = index.parse::<usize>().map_err(|_| malformed())?;
    Ok((job_id, index))
}

/// Which completed jobs the flagged list draws from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlaggedScope {
    #[default]
    AllCompleted,
    /// Only the completed job that finished last.
    LatestCompleted,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlaggedProvider {
    pub id: String,
    pub job_id: String,
    pub row_index: usize,
    pub name: String,
    pub npi: String,
    pub specialty: String,
    pub phone: String,
    pub validated_phone: Option<String>,
    pub confidence: f64,
    pub priority_score: f64,
    pub priority_level: PriorityLevel,
    pub error_types: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderDetail {
    pub id: String,
    pub job_id: String,
    pub index: usize,
    pub input: ProviderInput,
    pub output: ProviderOutput,
    pub status: String,
    pub reasons: Vec<String>,
    pub priority_score: f64,
    pub priority_level: PriorityLevel,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub id: String,
    pub job_id: String,
    pub row_index: usize,
    pub confidence: f64,
    pub report: ProviderReport,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl StatusCounts {
    fn add(&mut self, status: JobStatus) {
        match status {
            JobStatus::Queued => self.queued += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    pub total_processed: usize,
    pub total_validated: usize,
    pub total_flagged: usize,
    pub validated_pct: f64,
    pub avg_confidence: f64,
    pub throughput_per_hour: f64,
    pub jobs: StatusCounts,
}

/// Per-day totals, keyed by the UTC date a job started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub processed: usize,
    pub validated: usize,
    pub flagged: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorCategory {
    pub name: String,
    pub count: usize,
}

fn paginate<T>(items: Vec<T>, limit: usize, offset: usize) -> Page<T> {
    let total = items.len();
    let items = items.into_iter().skip(offset).take(limit).collect();
    Page {
        items,
        total,
        limit,
        offset,
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn error_types(report: &ProviderReport) -> Vec<String> {
    if report.reasons.is_empty() {
        vec![NEEDS_REVIEW.to_string()]
    } else {
        report.reasons.clone()
    }
}

/// Calls `f` for every flagged row of every completed job in scope.
fn for_each_flagged<F>(store: &JobStore, scope: FlaggedScope, mut f: F)
where
    F: FnMut(&UploadJob, &ProviderRow, &ProviderReport),
{
    let latest = match scope {
        FlaggedScope::AllCompleted => None,
        FlaggedScope::LatestCompleted => {
            let mut latest: Option<(chrono::DateTime<chrono::Utc>, String)> = None;
            store.visit(|job| {
                if job.status != JobStatus::Completed {
                    return;
                }
                if latest.as_ref().map_or(true, |(at, _)| job.recency() >= *at) {
                    latest = Some((job.recency(), job.id.clone()));
                }
            });
            match latest {
                Some((_, id)) => Some(id),
                None => return,
            }
        }
    };

    let policy = store.policy();
    store.visit(|job| {
        if job.status != JobStatus::Completed {
            return;
        }
        if latest.as_deref().is_some_and(|id| id != job.id) {
            return;
        }
        for row in &job.rows {
            if let Some(report) = &row.report {
                if policy.is_flagged(report) {
                    f(job, row, report);
                }
            }
        }
    });
}

/// Flagged rows sorted by priority score, highest first, then paginated.
///
/// Ties keep store order, so consecutive pages over an unchanged store are
/// disjoint and contiguous.
pub fn flagged_providers(
    store: &JobStore,
    scope: FlaggedScope,
    limit: usize,
    offset: usize,
) -> Page<FlaggedProvider> {
    let mut items = Vec::new();
    for_each_flagged(store, scope, |job, row, report| {
        items.push(FlaggedProvider {
            id: provider_id(&job.id, row.index),
            job_id: job.id.clone(),
            row_index: row.index,
            name: report.provider_input.name.clone(),
            npi: report.provider_input.npi.clone(),
            specialty: report.provider_input.specialty.clone(),
            phone: report.provider_input.phone.clone(),
            validated_phone: report.provider_output.phone.as_ref().map(|f| f.value.clone()),
            confidence: row.confidence.unwrap_or(0.0),
            priority_score: report.priority_score,
            priority_level: report.priority_level.clone(),
            error_types: error_types(report),
        });
    });

    items.sort_by(|a, b| b.priority_score.total_cmp(&a.priority_score));
    paginate(items, limit, offset)
}

/// Looks up one processed provider by composite id.
pub fn provider_by_id(store: &JobStore, id: &str) -> Result<ProviderDetail, LookupError> {
    let (job_id, index) = parse_provider_id(id)?;

    store
        .with_job(job_id, |job| {
            let row = job.rows.get(index).ok_or_else(|| LookupError::RowNotFound {
                job_id: job_id.to_string(),
                index,
            })?;
            let report = row.report.as_ref().ok_or_else(|| LookupError::NotProcessed {
                job_id: job_id.to_string(),
                index,
            })?;
            Ok(ProviderDetail {
                id: provider_id(job_id, index),
                job_id: job_id.to_string(),
                index,
                input: report.provider_input.clone(),
                output: report.provider_output.clone(),
                status: report.status.clone(),
                reasons: report.reasons.clone(),
                priority_score: report.priority_score,
                priority_level: report.priority_level.clone(),
                confidence: row.confidence.unwrap_or(0.0),
            })
        })
        .unwrap_or_else(|| Err(LookupError::JobNotFound(job_id.to_string())))
}

/// Flagged rows across all completed jobs, least confident first.
///
/// Equal confidences are ordered by priority score, highest first.
pub fn review_queue(store: &JobStore) -> Vec<ReviewItem> {
    let mut items = Vec::new();
    for_each_flagged(store, FlaggedScope::AllCompleted, |job, row, report| {
        items.push(ReviewItem {
            id: provider_id(&job.id, row.index),
            job_id: job.id.clone(),
            row_index: row.index,
            confidence: row.confidence.unwrap_or(0.0),
            report: report.clone(),
        });
    });

    items.sort_by(|a, b| match a.confidence.total_cmp(&b.confidence) {
        Ordering::Equal => b.report.priority_score.total_cmp(&a.report.priority_score),
        other => other,
    });
    items
}

/// One page of [`review_queue`].
pub fn review_queue_page(store: &JobStore, limit: usize, offset: usize) -> Page<ReviewItem> {
    paginate(review_queue(store), limit, offset)
}

pub fn dashboard_summary(store: &JobStore) -> DashboardSummary {
    let mut jobs = StatusCounts::default();
    let mut total_processed = 0;
    let mut total_validated = 0;
    let mut total_flagged = 0;
    let mut confidence_sum = 0.0;
    let mut confidence_jobs = 0usize;
    let mut finished_rows = 0usize;
    let mut finished_hours = 0.0;

    store.visit(|job| {
        jobs.add(job.status);
        total_processed += job.processed_count;
        total_validated += job.validated_count;
        total_flagged += job.flagged_count;

        if job.status == JobStatus::Completed {
            if let Some(avg) = job.avg_confidence {
                confidence_sum += avg;
                confidence_jobs += 1;
            }
        }
        if let Some(finished_at) = job.finished_at {
            finished_rows += job.processed_count;
            finished_hours += (finished_at - job.started_at).num_milliseconds() as f64 / 3.6e6;
        }
    });

    let validated_pct = if total_processed > 0 {
        round_to(total_validated as f64 * 100.0 / total_processed as f64, 1)
    } else {
        0.0
    };
    let avg_confidence = if confidence_jobs > 0 {
        round_to(confidence_sum / confidence_jobs as f64, 2)
    } else {
        0.0
    };
    let throughput_per_hour = if finished_hours > 0.0 {
        round_to(finished_rows as f64 / finished_hours, 1)
    } else {
        0.0
    };

    DashboardSummary {
        total_processed,
        total_validated,
        total_flagged,
        validated_pct,
        avg_confidence,
        throughput_per_hour,
        jobs,
    }
}

fn add_trend(by_date: &mut BTreeMap<NaiveDate, TrendPoint>, job: &UploadJob) {
    let date = job.started_at.date_naive();
    let point = by_date.entry(date).or_insert(TrendPoint {
        date,
        processed: 0,
        validated: 0,
        flagged: 0,
    });
    point.processed += job.processed_count;
    point.validated += job.validated_count;
    point.flagged += job.flagged_count;
}

/// Daily totals over every job in the store, oldest date first.
pub fn dashboard_trends(store: &JobStore) -> Vec<TrendPoint> {
    let mut by_date = BTreeMap::new();
    store.visit(|job| add_trend(&mut by_date, job));
    by_date.into_values().collect()
}

/// Most frequent review reasons across completed jobs.
pub fn error_categories(store: &JobStore, limit: usize) -> Vec<ErrorCategory> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for_each_flagged(store, FlaggedScope::AllCompleted, |_, _, report| {
        for reason in error_types(report) {
            *counts.entry(reason).or_default() += 1;
        }
    });

    let mut categories: Vec<ErrorCategory> = counts
        .into_iter()
        .map(|(name, count)| ErrorCategory { name, count })
        .collect();
    categories.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    categories.truncate(limit);
    categories
}
