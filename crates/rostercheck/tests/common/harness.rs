//! Test harness with scripted backends.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rostercheck::broadcast::JobProgressBroadcaster;
use rostercheck::{
    ArchiveExtractor, BatchDispatcher, ClassificationPolicy, ExtractionResult, JobStore,
    JobSummary, OracleError, ProviderInput, ProviderReport, UploadService, ValidationOracle,
};

/// What the scripted oracle does on one call.
pub enum Step {
    /// Build one report per input.
    Respond(fn(&ProviderInput) -> ProviderReport),
    /// Return this many reports fewer than requested.
    Short(usize),
    Fail(OracleError),
    Panic,
}

/// Oracle that follows a script and confirms everything once it runs out.
///
/// Before each call it records a snapshot of every job in the store.
pub struct ScriptedOracle {
    script: Mutex<VecDeque<Step>>,
    calls: Mutex<Vec<Vec<String>>>,
    observed: Mutex<Vec<Vec<JobSummary>>>,
    store: Mutex<Option<Arc<JobStore>>>,
}

impl ScriptedOracle {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            observed: Mutex::new(Vec::new()),
            store: Mutex::new(None),
        }
    }

    pub fn observe(&self, store: Arc<JobStore>) {
        *self.store.lock().unwrap() = Some(store);
    }

    /// Provider names of each call, in call order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Store snapshots taken at the start of each call.
    pub fn observed(&self) -> Vec<Vec<JobSummary>> {
        self.observed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ValidationOracle for ScriptedOracle {
    async fn validate_batch(
        &self,
        inputs: &[ProviderInput],
    ) -> Result<Vec<ProviderReport>, OracleError> {
        self.calls
            .lock()
            .unwrap()
            .push(inputs.iter().map(|i| i.name.clone()).collect());
        if let Some(store) = self.store.lock().unwrap().as_ref() {
            self.observed.lock().unwrap().push(store.list());
        }

        let step = self.script.lock().unwrap().pop_front();
        match step {
            None => Ok(inputs.iter().map(super::confirmed).collect()),
            Some(Step::Respond(build)) => Ok(inputs.iter().map(build).collect()),
            Some(Step::Short(missing)) => Ok(inputs
                .iter()
                .take(inputs.len().saturating_sub(missing))
                .map(super::confirmed)
                .collect()),
            Some(Step::Fail(err)) => Err(err),
            Some(Step::Panic) => panic!("scripted oracle panic"),
        }
    }
}

/// Extractor returning a fixed result.
pub struct ScriptedExtractor {
    result: Result<ExtractionResult, OracleError>,
    bundles: Mutex<Vec<(String, usize)>>,
}

impl ScriptedExtractor {
    pub fn returning(result: Result<ExtractionResult, OracleError>) -> Self {
        Self {
            result,
            bundles: Mutex::new(Vec::new()),
        }
    }

    pub fn with_reports(reports: Vec<ProviderReport>) -> Self {
        Self::returning(Ok(ExtractionResult {
            extracted_count: reports.len(),
            reports,
        }))
    }

    pub fn bundles(&self) -> Vec<(String, usize)> {
        self.bundles.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArchiveExtractor for ScriptedExtractor {
    async fn extract(
        &self,
        filename: &str,
        bundle: Vec<u8>,
    ) -> Result<ExtractionResult, OracleError> {
        self.bundles
            .lock()
            .unwrap()
            .push((filename.to_string(), bundle.len()));
        self.result.clone()
    }
}

/// Store, dispatcher and service wired to scripted backends.
pub struct TestHarness {
    pub store: Arc<JobStore>,
    pub oracle: Arc<ScriptedOracle>,
    pub extractor: Arc<ScriptedExtractor>,
    pub progress: JobProgressBroadcaster,
    pub service: UploadService,
}

impl TestHarness {
    pub fn new(script: Vec<Step>) -> Self {
        Self::builder(script).build()
    }

    pub fn builder(script: Vec<Step>) -> TestHarnessBuilder {
        TestHarnessBuilder {
            script,
            extractor: ScriptedExtractor::returning(Err(OracleError::Http(
                "no extractor scripted".to_string(),
            ))),
            policy: ClassificationPolicy::default(),
            batch_size: 10,
            call_timeout: Duration::from_secs(5),
        }
    }
}

pub struct TestHarnessBuilder {
    script: Vec<Step>,
    extractor: ScriptedExtractor,
    policy: ClassificationPolicy,
    batch_size: usize,
    call_timeout: Duration,
}

impl TestHarnessBuilder {
    pub fn extractor(mut self, extractor: ScriptedExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn policy(mut self, policy: ClassificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn build(self) -> TestHarness {
        let progress = JobProgressBroadcaster::new(1024);
        let store = Arc::new(JobStore::new(self.policy).with_progress(progress.clone()));
        let oracle = Arc::new(ScriptedOracle::new(self.script));
        oracle.observe(Arc::clone(&store));
        let extractor = Arc::new(self.extractor);

        let dispatcher = BatchDispatcher::new(
            Arc::clone(&store),
            oracle.clone(),
            extractor.clone(),
        )
        .with_batch_size(self.batch_size)
        .with_call_timeout(self.call_timeout);

        TestHarness {
            store,
            oracle,
            extractor,
            progress,
            service: UploadService::new(dispatcher),
        }
    }
}
