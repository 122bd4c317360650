use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::OracleError;
use crate::model::{ProviderInput, ProviderReport};

/// Remote service that validates provider records.
///
/// Implementations return one report per input, in input order.
#[async_trait]
pub trait ValidationOracle: Send + Sync {
    async fn validate_batch(
        &self,
        inputs: &[ProviderInput],
    ) -> Result<Vec<ProviderReport>, OracleError>;
}

/// Remote service that pulls provider records out of a document bundle.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    async fn extract(&self, filename: &str, bundle: Vec<u8>)
        -> Result<ExtractionResult, OracleError>;
}

/// Providers found in a bundle, each already validated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub extracted_count: usize,
    pub reports: Vec<ProviderReport>,
}
