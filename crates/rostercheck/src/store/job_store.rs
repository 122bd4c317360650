//! In-memory job store, the single owner of job and row state.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use crate::broadcast::{JobPhase, JobProgressBroadcaster, JobProgressEvent};
use crate::classify::ClassificationPolicy;
use crate::confidence::{job_avg_confidence, row_confidence};
use crate::model::{
    JobStatus, JobSummary, ProviderInput, ProviderReport, ProviderRow, RawFields, SourceKind,
    UploadJob,
};
use crate::progress::{count_rows, estimate_eta};

// ─── Lock helpers ───────────────────────────────────────────────────────────

fn read_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Job store {} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

fn write_lock<'a, T>(lock: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => {
            log::warn!("Job store {} lock was poisoned, recovering", what);
            poisoned.into_inner()
        }
    }
}

// ─── CommitOutcome ──────────────────────────────────────────────────────────

/// Result of [`JobStore::commit_batch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Reports were attached. `completed` is set when this commit finished the job.
    Committed { attached: usize, completed: bool },
    /// The job is unknown or already terminal; nothing was written.
    Rejected,
}

// ─── JobStore ───────────────────────────────────────────────────────────────

type SharedJob = Arc<RwLock<UploadJob>>;

#[derive(Default)]
struct JobIndex {
    /// Insertion order.
    order: Vec<SharedJob>,
    by_id: HashMap<String, SharedJob>,
}

/// Process-lifetime registry of upload jobs.
///
/// The index lock only guards membership; each job sits behind its own
/// `RwLock`, so a commit on one job never blocks readers of another and a
/// reader never observes a half-applied commit.
pub struct JobStore {
    jobs: RwLock<JobIndex>,
    policy: ClassificationPolicy,
    progress: Option<JobProgressBroadcaster>,
}

impl JobStore {
    pub fn new(policy: ClassificationPolicy) -> Self {
        Self {
            jobs: RwLock::new(JobIndex::default()),
            policy,
            progress: None,
        }
    }

    /// Publishes a [`JobProgressEvent`] for every observable change.
    pub fn with_progress(mut self, broadcaster: JobProgressBroadcaster) -> Self {
        self.progress = Some(broadcaster);
        self
    }

    pub fn policy(&self) -> &ClassificationPolicy {
        &self.policy
    }

    fn publish(&self, event: JobProgressEvent) {
        if let Some(progress) = &self.progress {
            progress.send(event);
        }
    }

    fn lookup(&self, job_id: &str) -> Option<SharedJob> {
        read_lock(&self.jobs, "index").by_id.get(job_id).cloned()
    }

    fn insert(&self, job: UploadJob) -> UploadJob {
        let snapshot = job.clone();
        let shared = Arc::new(RwLock::new(job));
        {
            let mut index = write_lock(&self.jobs, "index");
            index.by_id.insert(snapshot.id.clone(), Arc::clone(&shared));
            index.order.push(shared);
        }
        log::info!(
            "Created {:?} job {} for '{}' ({} providers)",
            snapshot.source_kind,
            snapshot.id,
            snapshot.filename,
            snapshot.total_count
        );
        self.publish(JobProgressEvent::from_job(&snapshot, JobPhase::Created));
        snapshot
    }

    /// Creates a job with one row per tabular input row.
    pub fn create_from_rows(&self, filename: &str, rows: Vec<RawFields>) -> UploadJob {
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(index, raw)| ProviderRow::new(index, raw))
            .collect();
        self.insert(UploadJob::new(filename, SourceKind::Tabular, rows))
    }

    /// Creates an archive job whose rows are unknown until extraction returns.
    pub fn create_for_archive(&self, filename: &str) -> UploadJob {
        self.insert(UploadJob::new(filename, SourceKind::Archive, Vec::new()))
    }

    /// Replaces the row set with extracted inputs and fixes `total_count`.
    ///
    /// Only an unfinished archive job that has no rows yet accepts inputs, so
    /// `total_count` is fixed once. Returns whether the rows were replaced.
    pub fn set_row_inputs(&self, job_id: &str, inputs: &[ProviderInput]) -> bool {
        let Some(shared) = self.lookup(job_id) else {
            log::warn!("set_row_inputs: job {} not found", job_id);
            return false;
        };

        let event = {
            let mut job = write_lock(&shared, "job");
            if job.is_finished() {
                log::warn!("set_row_inputs: job {} is already {}", job_id, job.status);
                return false;
            }
            if job.source_kind != SourceKind::Archive {
                log::warn!("set_row_inputs: job {} is not an archive job", job_id);
                return false;
            }
            if !job.rows.is_empty() {
                log::warn!(
                    "set_row_inputs: job {} already has {} rows",
                    job_id,
                    job.rows.len()
                );
                return false;
            }

            job.rows = inputs
                .iter()
                .enumerate()
                .map(|(index, input)| ProviderRow::new(index, input.to_raw_fields()))
                .collect();
            job.total_count = job.rows.len();
            JobProgressEvent::from_job(&job, JobPhase::RowsLoaded)
        };

        self.publish(event);
        true
    }

    /// Snapshot of one job, rows included.
    pub fn get(&self, job_id: &str) -> Option<UploadJob> {
        self.lookup(job_id)
            .map(|shared| read_lock(&shared, "job").clone())
    }

    /// Runs `f` against one job under its read lock, without cloning it.
    pub fn with_job<R, F: FnOnce(&UploadJob) -> R>(&self, job_id: &str, f: F) -> Option<R> {
        self.lookup(job_id).map(|shared| f(&*read_lock(&shared, "job")))
    }

    pub fn status(&self, job_id: &str) -> Option<JobStatus> {
        self.lookup(job_id).map(|shared| read_lock(&shared, "job").status)
    }

    /// Summaries of all jobs in insertion order.
    pub fn list(&self) -> Vec<JobSummary> {
        let mut summaries = Vec::new();
        self.visit(|job| summaries.push(job.summary()));
        summaries
    }

    /// Calls `f` with each job in insertion order, each under its read lock.
    pub fn visit<F: FnMut(&UploadJob)>(&self, mut f: F) {
        let jobs: Vec<SharedJob> = read_lock(&self.jobs, "index").order.clone();
        for shared in jobs {
            let job = read_lock(&shared, "job");
            f(&*job);
        }
    }

    pub fn len(&self) -> usize {
        read_lock(&self.jobs, "index").order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attaches `reports[i]` to row `start_index + i` and recomputes the
    /// derived job fields.
    ///
    /// This is the only incremental mutation path. Rows that already carry a
    /// report are not overwritten, so the job counters never decrease. A
    /// commit that brings `processed_count` up to a non-zero `total_count`
    /// completes the job.
    pub fn commit_batch(
        &self,
        job_id: &str,
        reports: Vec<ProviderReport>,
        start_index: usize,
    ) -> CommitOutcome {
        let Some(shared) = self.lookup(job_id) else {
            log::warn!("commit_batch: job {} not found", job_id);
            return CommitOutcome::Rejected;
        };

        let (outcome, event) = {
            let mut job = write_lock(&shared, "job");
            if job.is_finished() {
                log::warn!(
                    "commit_batch: job {} is already {}, dropping {} reports",
                    job_id,
                    job.status,
                    reports.len()
                );
                return CommitOutcome::Rejected;
            }

            let mut attached = 0;
            for (offset, report) in reports.into_iter().enumerate() {
                let index = start_index + offset;
                match job.rows.get_mut(index) {
                    Some(row) if row.report.is_none() => {
                        row.confidence = Some(row_confidence(&report));
                        row.report = Some(report);
                        attached += 1;
                    }
                    Some(_) => {
                        log::warn!(
                            "commit_batch: row {} of job {} already processed",
                            index,
                            job_id
                        );
                    }
                    None => {
                        log::warn!(
                            "commit_batch: row {} out of range for job {}",
                            index,
                            job_id
                        );
                    }
                }
            }

            self.recompute(&mut job);
            let completed = job.processed_count >= job.total_count && job.total_count > 0;
            if completed {
                self.finish(&mut job, JobStatus::Completed);
            }

            log::debug!(
                "Job {}: committed {} reports at {} ({}/{})",
                job_id,
                attached,
                start_index,
                job.processed_count,
                job.total_count
            );
            let phase = if completed {
                log::info!(
                    "Job {} completed: {} validated, {} flagged",
                    job_id,
                    job.validated_count,
                    job.flagged_count
                );
                JobPhase::Completed
            } else {
                JobPhase::BatchCommitted
            };
            (
                CommitOutcome::Committed { attached, completed },
                JobProgressEvent::from_job(&job, phase),
            )
        };

        self.publish(event);
        outcome
    }

    /// Forces the job into `failed`. Returns false if unknown or already finished.
    pub fn mark_failed(&self, job_id: &str, error: &str) -> bool {
        self.transition(job_id, JobStatus::Failed, Some(error))
    }

    /// Forces the job into `completed`. Returns false if unknown or already finished.
    pub fn mark_completed(&self, job_id: &str) -> bool {
        self.transition(job_id, JobStatus::Completed, None)
    }

    fn transition(&self, job_id: &str, status: JobStatus, error: Option<&str>) -> bool {
        let Some(shared) = self.lookup(job_id) else {
            log::warn!("Cannot mark unknown job {} as {}", job_id, status);
            return false;
        };

        let event = {
            let mut job = write_lock(&shared, "job");
            if job.is_finished() {
                log::debug!("Job {} already {}, ignoring {}", job_id, job.status, status);
                return false;
            }

            self.recompute(&mut job);
            if let Some(error) = error {
                job.last_error = Some(error.to_string());
                log::error!("Job {} failed: {}", job_id, error);
            } else {
                log::info!("Job {} marked completed", job_id);
            }
            self.finish(&mut job, status);

            let phase = match status {
                JobStatus::Failed => JobPhase::Failed,
                _ => JobPhase::Completed,
            };
            JobProgressEvent::from_job(&job, phase)
        };

        self.publish(event);
        true
    }

    fn recompute(&self, job: &mut UploadJob) {
        let counts = count_rows(&job.rows, &self.policy);
        job.processed_count = counts.processed;
        job.validated_count = counts.validated;
        job.flagged_count = counts.flagged;
        job.avg_confidence = job_avg_confidence(&job.rows);
        job.eta_seconds = estimate_eta(
            job.started_at,
            Utc::now(),
            job.processed_count,
            job.total_count,
        );
    }

    fn finish(&self, job: &mut UploadJob, status: JobStatus) {
        job.status = status;
        job.finished_at = Some(Utc::now());
        job.eta_seconds = Some(0);
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new(ClassificationPolicy::default())
    }
}
