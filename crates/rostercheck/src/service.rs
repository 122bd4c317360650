//! Ingestion entry points: create the job, then hand it to the dispatcher.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::broadcast;

use crate::broadcast::{JobProgressBroadcaster, JobProgressEvent};
use crate::config::Config;
use crate::dispatch::{BatchDispatcher, DispatchHandle, DispatchWork};
use crate::error::{IngestError, OracleError};
use crate::model::{RawFields, SourceKind, DEFAULT_MEMBER_IMPACT};
use crate::oracle::HttpOracle;
use crate::store::JobStore;
use crate::tabular::{parse_tabular, to_provider_input};

/// Archive uploads are recognised by a `.zip` extension.
pub fn source_kind_for(filename: &str) -> SourceKind {
    let is_zip = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"));
    if is_zip {
        SourceKind::Archive
    } else {
        SourceKind::Tabular
    }
}

/// Accepts uploads and returns as soon as their job exists.
///
/// Submissions spawn onto the current tokio runtime.
pub struct UploadService {
    dispatcher: BatchDispatcher,
    progress: Option<JobProgressBroadcaster>,
    default_member_impact: u32,
}

impl UploadService {
    pub fn new(dispatcher: BatchDispatcher) -> Self {
        Self {
            dispatcher,
            progress: None,
            default_member_impact: DEFAULT_MEMBER_IMPACT,
        }
    }

    /// Wires a store, the HTTP backend client and a progress channel from
    /// `config`.
    pub fn from_config(config: &Config) -> Result<Self, OracleError> {
        let progress = JobProgressBroadcaster::default();
        let store = Arc::new(
            JobStore::new(config.classification.clone()).with_progress(progress.clone()),
        );
        let oracle = Arc::new(HttpOracle::new(&config.oracle)?);
        let dispatcher = BatchDispatcher::from_config(store, oracle.clone(), oracle, config);

        Ok(Self {
            dispatcher,
            progress: Some(progress),
            default_member_impact: config.ingest.default_member_impact,
        })
    }

    pub fn with_default_member_impact(mut self, impact: u32) -> Self {
        self.default_member_impact = impact;
        self
    }

    pub fn store(&self) -> &Arc<JobStore> {
        self.dispatcher.store()
    }

    /// Live progress events, when the service was built with a channel.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<JobProgressEvent>> {
        self.progress.as_ref().map(JobProgressBroadcaster::subscribe)
    }

    /// Starts a job over already-parsed tabular rows.
    pub fn submit_rows(&self, filename: &str, rows: Vec<RawFields>) -> DispatchHandle {
        let inputs = rows
            .iter()
            .map(|row| to_provider_input(row, self.default_member_impact))
            .collect();
        let job = self.store().create_from_rows(filename, rows);
        self.dispatcher
            .spawn(&job.id, DispatchWork::Tabular { inputs })
    }

    /// Parses a delimited-text upload and starts a job over its rows.
    pub fn submit_tabular(
        &self,
        filename: &str,
        content: &[u8],
    ) -> Result<DispatchHandle, IngestError> {
        let rows = parse_tabular(content)?;
        Ok(self.submit_rows(filename, rows))
    }

    /// Starts an archive job; its size is unknown until extraction returns.
    pub fn submit_archive(&self, filename: &str, bundle: Vec<u8>) -> DispatchHandle {
        let job = self.store().create_for_archive(filename);
        let work = DispatchWork::Archive {
            filename: filename.to_string(),
            bundle,
        };
        self.dispatcher.spawn(&job.id, work)
    }

    /// Routes an upload by its filename.
    pub fn submit(&self, filename: &str, content: Vec<u8>) -> Result<DispatchHandle, IngestError> {
        match source_kind_for(filename) {
            SourceKind::Archive => Ok(self.submit_archive(filename, content)),
            SourceKind::Tabular => self.submit_tabular(filename, &content),
        }
    }
}
