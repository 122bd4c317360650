//! Drives jobs to a terminal status by calling the remote services and
//! committing their results into the [`JobStore`].

use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::Config;
use crate::error::OracleError;
use crate::model::{JobStatus, ProviderInput};
use crate::oracle::{ArchiveExtractor, ValidationOracle};
use crate::store::{CommitOutcome, JobStore};

pub const DEFAULT_BATCH_SIZE: usize = 10;

/// What a dispatcher task has to do for one job.
#[derive(Debug, Clone)]
pub enum DispatchWork {
    /// Validate these inputs in batches; input `i` belongs to row `i`.
    Tabular { inputs: Vec<ProviderInput> },
    /// Extract providers from a bundle, then commit them in one go.
    Archive { filename: String, bundle: Vec<u8> },
}

/// Handle to a spawned dispatcher task.
pub struct DispatchHandle {
    job_id: String,
    watchdog: JoinHandle<()>,
}

impl DispatchHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Waits until the job task has ended and its outcome has been recorded.
    pub async fn wait(self) {
        if let Err(e) = self.watchdog.await {
            error!("Watchdog for job {} ended abnormally: {}", self.job_id, e);
        }
    }
}

/// Sequential batch dispatcher shared by all jobs.
///
/// Batches of one job run strictly in index order. Any failed call fails the
/// whole job; nothing is retried.
#[derive(Clone)]
pub struct BatchDispatcher {
    store: Arc<JobStore>,
    oracle: Arc<dyn ValidationOracle>,
    extractor: Arc<dyn ArchiveExtractor>,
    batch_size: usize,
    inter_batch_delay: Duration,
    call_timeout: Duration,
}

impl BatchDispatcher {
    pub fn new(
        store: Arc<JobStore>,
        oracle: Arc<dyn ValidationOracle>,
        extractor: Arc<dyn ArchiveExtractor>,
    ) -> Self {
        Self {
            store,
            oracle,
            extractor,
            batch_size: DEFAULT_BATCH_SIZE,
            inter_batch_delay: Duration::ZERO,
            call_timeout: Duration::from_secs(300),
        }
    }

    pub fn from_config(
        store: Arc<JobStore>,
        oracle: Arc<dyn ValidationOracle>,
        extractor: Arc<dyn ArchiveExtractor>,
        config: &Config,
    ) -> Self {
        Self::new(store, oracle, extractor)
            .with_batch_size(config.dispatch.batch_size)
            .with_inter_batch_delay(Duration::from_millis(config.dispatch.inter_batch_delay_ms))
            .with_call_timeout(Duration::from_secs(config.oracle.request_timeout_secs))
    }

    /// Values below 1 are raised to 1.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_inter_batch_delay(mut self, delay: Duration) -> Self {
        self.inter_batch_delay = delay;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Runs `work` for `job_id` on a new task, watched by a second task that
    /// fails the job if the first one dies before reaching a terminal status.
    pub fn spawn(&self, job_id: &str, work: DispatchWork) -> DispatchHandle {
        let dispatcher = self.clone();
        let task_job_id = job_id.to_string();
        let task = tokio::spawn(async move { dispatcher.run(&task_job_id, work).await });

        let store = Arc::clone(&self.store);
        let watched_id = job_id.to_string();
        let watchdog = tokio::spawn(async move {
            let reason = match task.await {
                Ok(()) => {
                    if store.status(&watched_id) != Some(JobStatus::Processing) {
                        return;
                    }
                    "task returned without finishing the job".to_string()
                }
                Err(e) => match e.try_into_panic() {
                    Ok(payload) => panic_message(payload.as_ref()),
                    Err(e) => e.to_string(),
                },
            };
            let message = format!("dispatcher task terminated unexpectedly: {}", reason);
            if store.mark_failed(&watched_id, &message) {
                warn!("Job {}: {}", watched_id, message);
            }
        });

        DispatchHandle {
            job_id: job_id.to_string(),
            watchdog,
        }
    }

    /// Processes one job to completion on the current task.
    pub async fn run(&self, job_id: &str, work: DispatchWork) {
        let span = info_span!("dispatch", job_id = %job_id);
        async {
            match work {
                DispatchWork::Tabular { inputs } => self.run_tabular(job_id, &inputs).await,
                DispatchWork::Archive { filename, bundle } => {
                    self.run_archive(job_id, &filename, bundle).await
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_tabular(&self, job_id: &str, inputs: &[ProviderInput]) {
        if inputs.is_empty() {
            info!("Job {} has no providers, completing immediately", job_id);
            self.store.mark_completed(job_id);
            return;
        }

        let batch_count = inputs.len().div_ceil(self.batch_size);
        info!(
            "Job {}: validating {} providers in {} batches",
            job_id,
            inputs.len(),
            batch_count
        );

        for (batch_index, batch) in inputs.chunks(self.batch_size).enumerate() {
            let number = batch_index + 1;
            let start_index = batch_index * self.batch_size;

            if batch_index > 0 && !self.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.inter_batch_delay).await;
            }
            if !self.still_processing(job_id) {
                return;
            }

            debug!("Job {}: batch {}/{} ({} rows)", job_id, number, batch_count, batch.len());
            let reports = match self.call(self.oracle.validate_batch(batch)).await {
                Ok(reports) => reports,
                Err(e) => {
                    self.store
                        .mark_failed(job_id, &format!("Batch {} failed: {}", number, e));
                    return;
                }
            };

            if reports.len() != batch.len() {
                let mismatch = OracleError::ReportCountMismatch {
                    expected: batch.len(),
                    got: reports.len(),
                };
                self.store
                    .mark_failed(job_id, &format!("Batch {} failed: {}", number, mismatch));
                return;
            }

            if !self.still_processing(job_id) {
                return;
            }
            match self.store.commit_batch(job_id, reports, start_index) {
                CommitOutcome::Committed {
                    completed: true, ..
                } => return,
                CommitOutcome::Committed { .. } => {}
                CommitOutcome::Rejected => return,
            }
        }
    }

    async fn run_archive(&self, job_id: &str, filename: &str, bundle: Vec<u8>) {
        if !self.still_processing(job_id) {
            return;
        }

        info!("Job {}: extracting providers from '{}'", job_id, filename);
        let result = match self.call(self.extractor.extract(filename, bundle)).await {
            Ok(result) => result,
            Err(e) => {
                self.store.mark_failed(job_id, &e.to_string());
                return;
            }
        };

        if result.extracted_count == 0 || result.reports.is_empty() {
            self.store
                .mark_failed(job_id, &OracleError::EmptyExtraction.to_string());
            return;
        }
        if result.extracted_count != result.reports.len() {
            warn!(
                "Job {}: extractor reported {} providers but returned {} reports",
                job_id,
                result.extracted_count,
                result.reports.len()
            );
        }

        if !self.still_processing(job_id) {
            return;
        }
        let inputs: Vec<ProviderInput> = result
            .reports
            .iter()
            .map(|report| report.provider_input.clone())
            .collect();
        if !self.store.set_row_inputs(job_id, &inputs) {
            return;
        }

        if let CommitOutcome::Committed { .. } = self.store.commit_batch(job_id, result.reports, 0)
        {
            self.store.mark_completed(job_id);
        }
    }

    /// Bounds a remote call by the configured timeout.
    async fn call<T, F>(&self, fut: F) -> Result<T, OracleError>
    where
        F: Future<Output = Result<T, OracleError>>,
    {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(OracleError::Timeout {
                after: self.call_timeout,
            }),
        }
    }

    fn still_processing(&self, job_id: &str) -> bool {
        match self.store.status(job_id) {
            Some(JobStatus::Processing) => true,
            Some(status) => {
                info!("Job {} is {}, stopping dispatch", job_id, status);
                false
            }
            None => {
                warn!("Job {} disappeared from the store, stopping dispatch", job_id);
                false
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProviderReport;
    use crate::oracle::ExtractionResult;
    use crate::test_support::{input, raw_rows, report};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Confirms every input, except that the configured call panics or fails.
    #[derive(Default)]
    struct FakeOracle {
        calls: Mutex<Vec<usize>>,
        fail_on_call: Option<usize>,
        panic_on_call: Option<usize>,
        short_by: usize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl ValidationOracle for FakeOracle {
        async fn validate_batch(
            &self,
            inputs: &[ProviderInput],
        ) -> Result<Vec<ProviderReport>, OracleError> {
            let call = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(inputs.len());
                calls.len()
            };
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.panic_on_call == Some(call) {
                panic!("oracle exploded");
            }
            if self.fail_on_call == Some(call) {
                return Err(OracleError::Status {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            let count = inputs.len().saturating_sub(self.short_by);
            Ok((0..count).map(|_| report("confirmed", 1.0, [0.8; 5])).collect())
        }
    }

    struct FakeExtractor(Result<ExtractionResult, OracleError>);

    #[async_trait]
    impl ArchiveExtractor for FakeExtractor {
        async fn extract(
            &self,
            _filename: &str,
            _bundle: Vec<u8>,
        ) -> Result<ExtractionResult, OracleError> {
            self.0.clone()
        }
    }

    fn no_archive() -> Arc<dyn ArchiveExtractor> {
        Arc::new(FakeExtractor(Err(OracleError::Http("unused".to_string()))))
    }

    fn tabular_job(store: &JobStore, n: usize) -> (String, Vec<ProviderInput>) {
        let job = store.create_from_rows("roster.csv", raw_rows(n));
        let inputs = (0..n).map(|i| input(&format!("p{}", i))).collect();
        (job.id, inputs)
    }

    #[tokio::test]
    async fn test_tabular_batches_in_order_and_completes() {
        let store = Arc::new(JobStore::default());
        let oracle = Arc::new(FakeOracle::default());
        let dispatcher = BatchDispatcher::new(Arc::clone(&store), oracle.clone(), no_archive())
            .with_batch_size(10);
        let (job_id, inputs) = tabular_job(&store, 25);

        dispatcher.run(&job_id, DispatchWork::Tabular { inputs }).await;

        assert_eq!(*oracle.calls.lock().unwrap(), vec![10, 10, 5]);
        let job = store.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.processed_count, 25);
        assert_eq!(job.validated_count, 25);
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_batch_halts_job() {
        let store = Arc::new(JobStore::default());
        let oracle = Arc::new(FakeOracle {
            fail_on_call: Some(2),
            ..FakeOracle::default()
        });
        let dispatcher = BatchDispatcher::new(Arc::clone(&store), oracle.clone(), no_archive())
            .with_batch_size(10);
        let (job_id, inputs) = tabular_job(&store, 30);

        dispatcher.run(&job_id, DispatchWork::Tabular { inputs }).await;

        assert_eq!(oracle.calls.lock().unwrap().len(), 2);
        let job = store.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.processed_count, 10);
        assert_eq!(
            job.last_error.as_deref(),
            Some("Batch 2 failed: Backend returned 500: boom")
        );
        assert!(job.rows[20..].iter().all(|row| row.report.is_none()));
    }

    #[tokio::test]
    async fn test_short_response_fails_without_committing_batch() {
        let store = Arc::new(JobStore::default());
        let oracle = Arc::new(FakeOracle {
            short_by: 1,
            ..FakeOracle::default()
        });
        let dispatcher = BatchDispatcher::new(Arc::clone(&store), oracle, no_archive());
        let (job_id, inputs) = tabular_job(&store, 4);

        dispatcher.run(&job_id, DispatchWork::Tabular { inputs }).await;

        let job = store.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.processed_count, 0);
        assert_eq!(
            job.last_error.as_deref(),
            Some("Batch 1 failed: Report count mismatch: expected 4, got 3")
        );
    }

    #[tokio::test]
    async fn test_empty_tabular_job_completes() {
        let store = Arc::new(JobStore::default());
        let dispatcher =
            BatchDispatcher::new(Arc::clone(&store), Arc::new(FakeOracle::default()), no_archive());
        let (job_id, inputs) = tabular_job(&store, 0);

        dispatcher.run(&job_id, DispatchWork::Tabular { inputs }).await;

        let job = store.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.total_count, 0);
        assert_eq!(job.eta_seconds, Some(0));
    }

    #[tokio::test]
    async fn test_timeout_fails_job() {
        let store = Arc::new(JobStore::default());
        let oracle = Arc::new(FakeOracle {
            delay: Some(Duration::from_millis(200)),
            ..FakeOracle::default()
        });
        let dispatcher = BatchDispatcher::new(Arc::clone(&store), oracle, no_archive())
            .with_call_timeout(Duration::from_millis(20));
        let (job_id, inputs) = tabular_job(&store, 3);

        dispatcher.run(&job_id, DispatchWork::Tabular { inputs }).await;

        let job = store.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(
            job.last_error.as_deref(),
            Some("Batch 1 failed: Backend call timed out after 20ms")
        );
    }

    #[tokio::test]
    async fn test_externally_failed_job_is_not_written() {
        let store = Arc::new(JobStore::default());
        let oracle = Arc::new(FakeOracle::default());
        let dispatcher = BatchDispatcher::new(Arc::clone(&store), oracle.clone(), no_archive());
        let (job_id, inputs) = tabular_job(&store, 5);
        store.mark_failed(&job_id, "cancelled by operator");

        dispatcher.run(&job_id, DispatchWork::Tabular { inputs }).await;

        assert!(oracle.calls.lock().unwrap().is_empty());
        let job = store.get(&job_id).unwrap();
        assert_eq!(job.processed_count, 0);
        assert_eq!(job.last_error.as_deref(), Some("cancelled by operator"));
    }

    #[tokio::test]
    async fn test_watchdog_fails_job_when_task_panics() {
        let store = Arc::new(JobStore::default());
        let oracle = Arc::new(FakeOracle {
            panic_on_call: Some(1),
            ..FakeOracle::default()
        });
        let dispatcher = BatchDispatcher::new(Arc::clone(&store), oracle, no_archive());
        let (job_id, inputs) = tabular_job(&store, 3);

        let handle = dispatcher.spawn(&job_id, DispatchWork::Tabular { inputs });
        assert_eq!(handle.job_id(), job_id);
        handle.wait().await;

        let job = store.get(&job_id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        let error = job.last_error.unwrap();
        assert!(error.starts_with("dispatcher task terminated unexpectedly"));
        assert!(error.contains("oracle exploded"));
    }

    #[tokio::test]
    async fn test_archive_rows_come_from_reports() {
        let store = Arc::new(JobStore::default());
        let mut first = report("confirmed", 1.0, [1.0; 5]);
        first.provider_input = input("alpha");
        let mut second = report("needs_review", 6.0, [0.5; 5]);
        second.provider_input = input("beta");
        let extractor = Arc::new(FakeExtractor(Ok(ExtractionResult {
            extracted_count: 2,
            reports: vec![first, second],
        })));
        let dispatcher =
            BatchDispatcher::new(Arc::clone(&store), Arc::new(FakeOracle::default()), extractor);
        let job = store.create_for_archive("bundle.zip");

        let work = DispatchWork::Archive {
            filename: "bundle.zip".to_string(),
            bundle: vec![1, 2, 3],
        };
        dispatcher.spawn(&job.id, work).wait().await;

        let job = store.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.total_count, 2);
        assert_eq!(job.validated_count, 1);
        assert_eq!(job.flagged_count, 1);
        assert_eq!(job.rows[1].raw_fields.get("name").map(String::as_str), Some("beta"));
    }

    #[tokio::test]
    async fn test_empty_extraction_fails() {
        let store = Arc::new(JobStore::default());
        let extractor = Arc::new(FakeExtractor(Ok(ExtractionResult::default())));
        let dispatcher =
            BatchDispatcher::new(Arc::clone(&store), Arc::new(FakeOracle::default()), extractor);
        let job = store.create_for_archive("empty.zip");

        let work = DispatchWork::Archive {
            filename: "empty.zip".to_string(),
            bundle: vec![],
        };
        dispatcher.run(&job.id, work).await;

        let job = store.get(&job.id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.total_count, 0);
        assert_eq!(
            job.last_error.as_deref(),
            Some("No providers extracted from archive")
        );
    }

    #[tokio::test]
    async fn test_extractor_error_text_is_recorded() {
        let store = Arc::new(JobStore::default());
        let extractor = Arc::new(FakeExtractor(Err(OracleError::Status {
            status: 422,
            body: "not a zip".to_string(),
        })));
        let dispatcher =
            BatchDispatcher::new(Arc::clone(&store), Arc::new(FakeOracle::default()), extractor);
        let job = store.create_for_archive("bad.zip");

        let work = DispatchWork::Archive {
            filename: "bad.zip".to_string(),
            bundle: vec![],
        };
        dispatcher.run(&job.id, work).await;

        let job = store.get(&job.id).unwrap();
        assert_eq!(job.last_error.as_deref(), Some("Backend returned 422: not a zip"));
    }

    #[test]
    fn test_batch_size_floor() {
        let dispatcher = BatchDispatcher::new(
            Arc::new(JobStore::default()),
            Arc::new(FakeOracle::default()),
            no_archive(),
        )
        .with_batch_size(0);
        assert_eq!(dispatcher.batch_size(), 1);
    }
}
