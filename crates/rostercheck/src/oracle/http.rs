//! HTTP client for the validation backend.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;

use super::client::{ArchiveExtractor, ExtractionResult, ValidationOracle};
use crate::config::OracleConfig;
use crate::error::OracleError;
use crate::model::{ProviderInput, ProviderReport};

/// Maximum length of a backend error body kept in `last_error`.
const MAX_ERROR_BODY_LENGTH: usize = 500;

fn truncate_body(body: &str) -> String {
    if body.chars().count() > MAX_ERROR_BODY_LENGTH {
        let head: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
        format!("{}... (truncated)", head)
    } else {
        body.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    reports: Vec<ProviderReport>,
}

#[derive(Debug, Deserialize)]
struct ExtractResponse {
    #[serde(default)]
    total_extracted_providers: usize,
    #[serde(default)]
    reports: Vec<ProviderReport>,
}

/// [`ValidationOracle`] and [`ArchiveExtractor`] over the backend's JSON API.
pub struct HttpOracle {
    client: Client,
    validate_url: String,
    extract_url: String,
}

impl HttpOracle {
    pub fn new(config: &OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OracleError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            validate_url: config.validate_url(),
            extract_url: config.extract_url(),
        })
    }

    async fn check_status(response: Response) -> Result<Response, OracleError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(OracleError::Status {
            status: status.as_u16(),
            body: truncate_body(&body),
        })
    }
}

fn transport_error(err: reqwest::Error) -> OracleError {
    if err.is_decode() {
        OracleError::Decode(err.to_string())
    } else {
        OracleError::Http(err.to_string())
    }
}

#[async_trait]
impl ValidationOracle for HttpOracle {
    async fn validate_batch(
        &self,
        inputs: &[ProviderInput],
    ) -> Result<Vec<ProviderReport>, OracleError> {
        debug!("POST {} with {} providers", self.validate_url, inputs.len());

        let response = self
            .client
            .post(&self.validate_url)
            .json(inputs)
            .send()
            .await
            .map_err(transport_error)?;

        let body: ValidateResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| OracleError::Decode(e.to_string()))?;

        Ok(body.reports)
    }
}

#[async_trait]
impl ArchiveExtractor for HttpOracle {
    async fn extract(
        &self,
        filename: &str,
        bundle: Vec<u8>,
    ) -> Result<ExtractionResult, OracleError> {
        debug!("POST {} with {} ({} bytes)", self.extract_url, filename, bundle.len());

        let part = Part::bytes(bundle)
            .file_name(filename.to_string())
            .mime_str("application/zip")
            .map_err(transport_error)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.extract_url)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let body: ExtractResponse = Self::check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| OracleError::Decode(e.to_string()))?;

        Ok(ExtractionResult {
            extracted_count: body.total_extracted_providers,
            reports: body.reports,
        })
    }
}
