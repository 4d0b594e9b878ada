//! OCR/analysis provider client
//!
//! Uploads the selected document as a single multipart body and reads back the
//! extracted text together with the provider's analysis. One bounded wait, no
//! retries: re-sending a large upload is left to the caller.

use super::config::AnalysisConfig;
use super::http_client::{classify_transport_error, upload_client};
use super::utils::provider_error_text;
use crate::error::{SessionError, SessionResult};
use crate::identity::{authorize, Principal};
use crate::session::{AnalysisResult, Document};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Instant;

/// Anything that can turn a document into an [`AnalysisResult`]
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(
        &self,
        document: &Document,
        principal: Option<&Principal>,
    ) -> SessionResult<AnalysisResult>;
}

/// HTTP client for the upload/analysis endpoint
pub struct AnalysisClient {
    client: Client,
    config: AnalysisConfig,
}

impl AnalysisClient {
    /// Create a client on the shared upload connection pool
    pub fn new(config: AnalysisConfig) -> Self {
        Self::with_client(upload_client().clone(), config)
    }

    pub fn with_client(client: Client, config: AnalysisConfig) -> Self {
        Self { client, config }
    }

    fn build_form(document: &Document) -> SessionResult<Form> {
        let part = Part::bytes(document.payload().to_vec())
            .file_name(document.name.clone())
            .mime_str(document.media_type.as_mime())
            .map_err(|_| SessionError::UnsupportedMediaType {
                media_type: document.media_type.to_string(),
            })?;

        Ok(Form::new().part("file", part))
    }
}

#[async_trait]
impl AnalysisProvider for AnalysisClient {
    async fn analyze(
        &self,
        document: &Document,
        principal: Option<&Principal>,
    ) -> SessionResult<AnalysisResult> {
        let form = Self::build_form(document)?;
        let started = Instant::now();

        tracing::info!(
            document = %document.id,
            endpoint = %self.config.endpoint,
            bytes = document.len(),
            "Uploading document for analysis"
        );

        let request = self
            .client
            .post(&self.config.endpoint)
            .timeout(self.config.timeout)
            .multipart(form);

        let response = authorize(request, principal)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, self.config.timeout))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| classify_transport_error(&e, self.config.timeout))?;

        let result = parse_analysis_response(status, &body);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(analysis) => tracing::info!(
                document = %document.id,
                chars = analysis.extracted_text.len(),
                elapsed_ms,
                "Analysis received"
            ),
            Err(e) => tracing::warn!(
                document = %document.id,
                status,
                kind = %e.kind(),
                elapsed_ms,
                "Analysis failed: {}",
                e
            ),
        }

        result
    }
}

/// Parse the analysis provider's HTTP response
pub fn parse_analysis_response(status: u16, body: &str) -> SessionResult<AnalysisResult> {
    if !(200..300).contains(&status) {
        return Err(SessionError::ProviderError {
            status: Some(status),
            message: provider_error_text(body),
        });
    }

    #[derive(Deserialize)]
    struct RawAnalysis {
        text: Option<String>,
        analysis: Option<String>,
    }

    let raw: RawAnalysis =
        serde_json::from_str(body).map_err(|e| SessionError::MalformedProviderResponse {
            message: format!("invalid JSON: {}", e),
        })?;

    let text = raw.text.ok_or_else(|| SessionError::MalformedProviderResponse {
        message: "missing field 'text'".to_string(),
    })?;
    let analysis = raw.analysis.ok_or_else(|| SessionError::MalformedProviderResponse {
        message: "missing field 'analysis'".to_string(),
    })?;

    Ok(AnalysisResult::new(text, analysis))
}
