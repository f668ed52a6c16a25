//! Error types for the mailsort library.
//!
//! Every failure is a [`MailsortError`]. Variants are grouped by the stage
//! that raises them, and each one maps to an [`ErrorKind`] so that outer
//! layers (the HTTP surface, the CLI) can choose a status code or exit path
//! without matching on individual variants:
//!
//! | Kind | Raised by | HTTP |
//! |------|-----------|------|
//! | [`ErrorKind::Validation`] | bad type/extension, empty input, suspicious content | 400 |
//! | [`ErrorKind::TooLarge`] | upload, file or extracted text above a limit | 413 |
//! | [`ErrorKind::NotFound`] | missing source file | 400 |
//! | [`ErrorKind::RateLimited`] | gatekeeper | 429 |
//! | [`ErrorKind::Upstream`] | LLM or OCR call, malformed model output | 500 |
//! | [`ErrorKind::Internal`] | anything unexpected | 500 |
//!
//! Upstream messages are meant to be shown to end users, so they never embed
//! credentials; see [`redact`].

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the mailsort library.
#[derive(Debug, Error)]
pub enum MailsortError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The upload declared a content type other than PDF or plain text.
    #[error("Unsupported file type. Use PDF or TXT. Received: {content_type}")]
    UnsupportedContentType { content_type: String },

    /// The file extension is not one the ingestion pipeline understands.
    #[error("Unsupported file type '{extension}'. Supported extensions: {supported}")]
    UnsupportedExtension { extension: String, supported: String },

    /// Source file does not exist.
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// File or upload exceeds the configured maximum.
    #[error("File too large. Maximum {max_mb:.0}MB. Received: {size_mb:.2}MB")]
    FileTooLarge { size_mb: f64, max_mb: f64 },

    /// Upload was empty, or nothing usable survived extraction and cleaning.
    #[error("Empty file or no valid content")]
    EmptyContent,

    /// The PDF could not be parsed at all.
    #[error("PDF '{path}' could not be read: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// A PDF had no text layer and no OCR engine is configured.
    #[error(
        "PDF contains no extractable text (it may be a scanned document) and OCR is not \
configured.\nSet OCR_SPACE_API_KEY to enable the OCR fallback; a free key is available at \
https://ocr.space/ocrapi"
    )]
    OcrNotConfigured,

    // ── Gatekeeper errors ─────────────────────────────────────────────────
    /// Extracted text is longer than the screening limit.
    #[error("Content too long. Maximum {max_chars} characters of text.")]
    ContentTooLong { max_chars: usize },

    /// Content matched the coarse SQL / script denylist.
    #[error("Content looks malicious. Please send a legitimate e-mail.")]
    SuspiciousContent,

    /// Client exceeded one of its request windows.
    #[error("Too many requests. Maximum {limit} requests per {window}. Try again later.")]
    RateLimited { limit: usize, window: &'static str },

    // ── OCR errors ────────────────────────────────────────────────────────
    /// File is above the OCR service's hard upload limit.
    #[error(
        "File too large for OCR ({size_mb:.2}MB). The OCR service accepts at most {max_mb:.0}MB.\n\
Consider compressing the PDF or upgrading the OCR plan."
    )]
    OcrFileTooLarge { size_mb: f64, max_mb: f64 },

    /// The OCR call failed (timeout, network, protocol or processing error).
    #[error("OCR failed: {0}")]
    OcrFailed(String),

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The generative-model call itself failed.
    #[error("Classification failed: {0}")]
    ClassificationFailed(String),

    /// The model answered, but not with a usable JSON object.
    #[error("Model response is malformed: {0}")]
    MalformedResponse(String),

    /// A mandatory field is absent from the model's JSON.
    #[error("Model response is missing required field '{field}'")]
    MissingField { field: &'static str },

    /// A field is present but has the wrong JSON type.
    #[error("Model response field '{field}' must be {expected}")]
    InvalidFieldType {
        field: &'static str,
        expected: &'static str,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured LLM provider could not be constructed.
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of a [`MailsortError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    TooLarge,
    NotFound,
    RateLimited,
    Upstream,
    Internal,
}

impl MailsortError {
    pub fn kind(&self) -> ErrorKind {
        use MailsortError::*;
        match self {
            UnsupportedContentType { .. }
            | UnsupportedExtension { .. }
            | EmptyContent
            | CorruptPdf { .. }
            | OcrNotConfigured
            | SuspiciousContent => ErrorKind::Validation,
            FileTooLarge { .. } | ContentTooLong { .. } => ErrorKind::TooLarge,
            FileNotFound { .. } => ErrorKind::NotFound,
            RateLimited { .. } => ErrorKind::RateLimited,
            OcrFileTooLarge { .. }
            | OcrFailed(_)
            | ClassificationFailed(_)
            | MalformedResponse(_)
            | MissingField { .. }
            | InvalidFieldType { .. } => ErrorKind::Upstream,
            InvalidConfig(_) | ProviderNotConfigured { .. } | Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Replace every occurrence of `secret` in `message` with `***`.
///
/// Some providers put the API key in the request URL, and transport errors
/// echo that URL back.
pub fn redact(message: &str, secret: &str) -> String {
    if secret.is_empty() {
        return message.to_string();
    }
    message.replace(secret, "***")
}

/// Bytes → megabytes, for error messages.
pub(crate) fn to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}
