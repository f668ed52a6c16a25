//! Analysis entry points: uploaded document or local file in, verdict out.
//!
//! [`Analyzer`] owns the ingestion pipeline and the classifier and runs the
//! validation steps between them in a fixed order. Rate limiting is not done
//! here: it depends on who is calling, which only the HTTP layer knows.

use crate::config::MailsortConfig;
use crate::error::MailsortError;
use crate::gatekeeper::{check_upload_size, screen_content};
use crate::output::{ClassificationResult, UploadedDocument};
use crate::pipeline::ingest::Ingestor;
use crate::pipeline::llm::{Classifier, ProviderGenerator, TextGenerator};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// MIME types accepted for upload.
pub const ALLOWED_CONTENT_TYPES: [&str; 2] = ["application/pdf", "text/plain"];

/// Runs one document through validation, ingestion, screening and
/// classification.
pub struct Analyzer {
    ingestor: Ingestor,
    classifier: Classifier,
    max_upload_bytes: u64,
    max_content_chars: usize,
    temp_dir: PathBuf,
}

impl Analyzer {
    pub fn new(ingestor: Ingestor, classifier: Classifier, config: &MailsortConfig) -> Self {
        Self {
            ingestor,
            classifier,
            max_upload_bytes: config.max_upload_bytes,
            max_content_chars: config.max_content_chars,
            temp_dir: std::env::temp_dir(),
        }
    }

    /// Stage uploads in `dir` instead of the system temp directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Build the production analyzer: OCR.space (when keyed) and the
    /// configured LLM provider.
    pub fn from_config(config: &MailsortConfig) -> Result<Self, MailsortError> {
        let provider = resolve_provider(config)?;
        let generator = Arc::new(ProviderGenerator::new(provider, config));
        Ok(Self::with_generator(config, generator))
    }

    /// Build with a caller-supplied text generator.
    pub fn with_generator(config: &MailsortConfig, generator: Arc<dyn TextGenerator>) -> Self {
        Self::new(
            Ingestor::from_config(config),
            Classifier::new(generator),
            config,
        )
    }

    /// Analyse an uploaded document.
    ///
    /// The upload is written to a temporary file that is removed when this
    /// function returns, on success and on every error path.
    pub async fn analyze(
        &self,
        document: &UploadedDocument,
    ) -> Result<ClassificationResult, MailsortError> {
        let start = Instant::now();
        info!(
            "Analyzing upload '{}' ({}, {} bytes)",
            document.filename,
            document.content_type,
            document.bytes.len()
        );

        // ── Step 1: Validate the upload ──────────────────────────────────
        let mime = base_mime(&document.content_type);
        if !ALLOWED_CONTENT_TYPES.contains(&mime.as_str()) {
            return Err(MailsortError::UnsupportedContentType {
                content_type: document.content_type.clone(),
            });
        }
        if document.bytes.is_empty() {
            return Err(MailsortError::EmptyContent);
        }
        check_upload_size(document.bytes.len() as u64, self.max_upload_bytes)?;

        // ── Step 2: Stage to a temporary file ────────────────────────────
        let suffix = temp_suffix(&document.filename, &mime);
        let tmp = stage_upload(&self.temp_dir, suffix, document.bytes.clone()).await?;
        debug!("Staged upload at {}", tmp.path().display());

        // ── Steps 3-5: Ingest, screen, classify ──────────────────────────
        // `tmp` is dropped (and the file deleted) when this function returns
        let result = self.analyze_file(tmp.path()).await?;
        info!("Analysis finished in {:?}", start.elapsed());
        Ok(result)
    }

    /// Analyse a file on disk: ingest, screen and classify.
    pub async fn analyze_file(&self, path: &Path) -> Result<ClassificationResult, MailsortError> {
        let text = self.ingestor.ingest(path).await?;
        if text.is_empty() {
            return Err(MailsortError::EmptyContent);
        }
        screen_content(&text, self.max_content_chars)?;
        self.classifier.classify(&text).await
    }
}

/// Write the upload to a fresh temp file in `dir` off the async workers.
async fn stage_upload(
    dir: &Path,
    suffix: String,
    bytes: Vec<u8>,
) -> Result<NamedTempFile, MailsortError> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || stage_upload_blocking(&dir, &suffix, &bytes))
        .await
        .map_err(|e| MailsortError::Internal(format!("Upload staging task panicked: {}", e)))?
}

fn stage_upload_blocking(
    dir: &Path,
    suffix: &str,
    bytes: &[u8],
) -> Result<NamedTempFile, MailsortError> {
    let mut tmp = tempfile::Builder::new()
        .prefix("mailsort-")
        .suffix(suffix)
        .tempfile_in(dir)
        .map_err(|e| MailsortError::Internal(format!("tempfile: {e}")))?;
    tmp.write_all(bytes)
        .map_err(|e| MailsortError::Internal(format!("tempfile write: {e}")))?;
    tmp.flush()
        .map_err(|e| MailsortError::Internal(format!("tempfile flush: {e}")))?;
    Ok(tmp)
}

/// `"text/plain; charset=utf-8"` → `"text/plain"`.
fn base_mime(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Temp-file suffix: the upload's own extension, else one matching its MIME type.
fn temp_suffix(filename: &str, mime: &str) -> String {
    match Path::new(filename).extension() {
        Some(ext) if !ext.is_empty() => format!(".{}", ext.to_string_lossy()),
        _ if mime == "application/pdf" => ".pdf".to_string(),
        _ => ".txt".to_string(),
    }
}

/// Resolve the LLM provider: a pre-built one wins, else the named provider.
///
/// [`ProviderFactory::create_llm_provider`] reads the provider's API key
/// (`GEMINI_API_KEY` for `gemini`) from the environment.
pub fn resolve_provider(config: &MailsortConfig) -> Result<Arc<dyn LLMProvider>, MailsortError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    ProviderFactory::create_llm_provider(&config.provider_name, &config.model).map_err(|e| {
        MailsortError::ProviderNotConfigured {
            provider: config.provider_name.clone(),
            hint: format!(
                "Set GEMINI_API_KEY and GEMINI_MODEL (or MAILSORT_LLM_PROVIDER with that \
                 provider's key).\nError: {}",
                e
            ),
        }
    })
}
