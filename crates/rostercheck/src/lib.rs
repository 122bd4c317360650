pub mod broadcast;
pub mod classify;
pub mod confidence;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod oracle;
pub mod progress;
pub mod projection;
pub mod service;
pub mod store;
pub mod tabular;
pub mod telemetry;

#[cfg(test)]
mod test_support;

pub use broadcast::{JobPhase, JobProgressBroadcaster, JobProgressEvent};
pub use classify::ClassificationPolicy;
pub use config::{load_config, load_config_from_str, Config};
pub use dispatch::{BatchDispatcher, DispatchHandle, DispatchWork};
pub use error::{ConfigError, IngestError, LookupError, OracleError, Result, RosterError};
pub use model::{
    JobStatus, JobSummary, ProviderInput, ProviderReport, ProviderRow, SourceKind, UploadJob,
};
pub use oracle::{ArchiveExtractor, ExtractionResult, HttpOracle, ValidationOracle};
pub use projection::{FlaggedScope, Page};
pub use service::UploadService;
pub use store::{CommitOutcome, JobStore};
