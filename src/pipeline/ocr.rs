//! OCR fallback for PDFs without a text layer.
//!
//! Scanned documents are just page images wrapped in a PDF, so direct
//! extraction finds nothing. [`OcrSpaceClient`] sends the whole file to the
//! OCR.space `parse/image` endpoint and returns the text of the first parsed
//! result.
//!
//! The service rejects uploads above 1 MB, so oversized files fail fast with
//! [`MailsortError::OcrFileTooLarge`] instead of being truncated. There is no
//! retry: one attempt per analysis, bounded by the configured timeout.
//!
//! The [`OcrEngine`] trait is the seam the ingestion pipeline depends on.

use crate::config::MailsortConfig;
use crate::error::{redact, to_mb, MailsortError};
use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Turns a PDF file into text.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn extract_text(&self, pdf_path: &Path) -> Result<String, MailsortError>;
}

/// Client for the OCR.space HTTP API.
pub struct OcrSpaceClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    language: String,
    timeout: Duration,
    max_file_bytes: u64,
}

impl OcrSpaceClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        let defaults = MailsortConfig::default();
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: defaults.ocr_endpoint,
            language: defaults.ocr_language,
            timeout: Duration::from_secs(defaults.ocr_timeout_secs),
            max_file_bytes: defaults.ocr_max_file_bytes,
        }
    }

    /// Build a client from configuration; `None` when no OCR key is set.
    pub fn from_config(config: &MailsortConfig) -> Option<Self> {
        let key = config.ocr_api_key.as_deref().filter(|k| !k.is_empty())?;
        Some(
            Self::new(key)
                .with_endpoint(&config.ocr_endpoint)
                .with_language(&config.ocr_language)
                .with_timeout(Duration::from_secs(config.ocr_timeout_secs))
                .with_max_file_bytes(config.ocr_max_file_bytes),
        )
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_file_bytes(mut self, bytes: u64) -> Self {
        self.max_file_bytes = bytes;
        self
    }

    fn validate_api_key(&self) -> Result<(), MailsortError> {
        if self.api_key.trim().is_empty() {
            return Err(MailsortError::OcrNotConfigured);
        }
        Ok(())
    }

    async fn validate_file(&self, path: &Path) -> Result<u64, MailsortError> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| MailsortError::FileNotFound {
                path: path.to_path_buf(),
            })?;
        let size = metadata.len();
        if size > self.max_file_bytes {
            return Err(MailsortError::OcrFileTooLarge {
                size_mb: to_mb(size),
                max_mb: to_mb(self.max_file_bytes),
            });
        }
        Ok(size)
    }

    async fn send_request(&self, path: &Path) -> Result<OcrResponse, MailsortError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| MailsortError::Internal(format!("Failed to read file for OCR: {}", e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document.pdf".to_string());

        let file_part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/pdf")
            .map_err(|e| MailsortError::Internal(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .text("apikey", self.api_key.clone())
            .text("language", self.language.clone())
            .text("isOverlayRequired", "false")
            .text("detectOrientation", "true")
            .text("scale", "true")
            .part("file", file_part);

        info!("Sending PDF to OCR endpoint");
        let response = self
            .client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(MailsortError::OcrFailed(format!(
                "OCR API returned status {}: {}",
                status,
                redact(&body, &self.api_key)
            )));
        }

        response.json::<OcrResponse>().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                MailsortError::OcrFailed(format!("OCR API returned an unreadable body: {}", e))
            }
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> MailsortError {
        if e.is_timeout() {
            MailsortError::OcrFailed(format!(
                "OCR request timed out after {}s. The file may be too large or complex.",
                self.timeout.as_secs()
            ))
        } else {
            MailsortError::OcrFailed(format!(
                "Network error during OCR: {}",
                redact(&e.to_string(), &self.api_key)
            ))
        }
    }
}

#[async_trait]
impl OcrEngine for OcrSpaceClient {
    #[tracing::instrument(skip_all, fields(path = %pdf_path.display()))]
    async fn extract_text(&self, pdf_path: &Path) -> Result<String, MailsortError> {
        self.validate_api_key()?;
        let size = self.validate_file(pdf_path).await?;
        debug!(bytes = size, "OCR input validated");

        let response = self.send_request(pdf_path).await?;
        let text = parse_ocr_response(response)?;
        info!(chars = text.len(), "OCR extracted text from PDF");
        Ok(text)
    }
}

/// OCR.space response body (the fields we read).
#[derive(Debug, Deserialize)]
pub struct OcrResponse {
    #[serde(rename = "IsErroredOnProcessing", default)]
    pub is_errored_on_processing: bool,
    /// Sent as `null` alongside some processing errors.
    #[serde(rename = "ParsedResults", default)]
    pub parsed_results: Option<Vec<ParsedResult>>,
    #[serde(rename = "ErrorMessage", default)]
    pub error_message: Option<serde_json::Value>,
    #[serde(rename = "ErrorDetails", default)]
    pub error_details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ParsedResult {
    #[serde(rename = "ParsedText", default)]
    pub parsed_text: Option<String>,
}

/// Interpret an OCR response: processing errors and blank text are failures.
pub fn parse_ocr_response(response: OcrResponse) -> Result<String, MailsortError> {
    if response.is_errored_on_processing {
        return Err(MailsortError::OcrFailed(format!(
            "OCR processing error: {}. Details: {}",
            describe(response.error_message.as_ref(), "Unknown error"),
            describe(response.error_details.as_ref(), "none"),
        )));
    }

    let first = response
        .parsed_results
        .unwrap_or_default()
        .into_iter()
        .next()
        .ok_or_else(|| MailsortError::OcrFailed("OCR API returned no results".to_string()))?;

    let text = first.parsed_text.unwrap_or_default();
    if text.trim().is_empty() {
        return Err(MailsortError::OcrFailed(
            "OCR could not extract any text from the PDF. The PDF may be blank or the image \
             quality too low."
                .to_string(),
        ));
    }
    Ok(text)
}

/// Render `ErrorMessage` / `ErrorDetails`, which arrive as a string or a list of strings.
fn describe(value: Option<&serde_json::Value>, fallback: &str) -> String {
    match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        Some(serde_json::Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join("; "),
        _ => fallback.to_string(),
    }
}
