//! Result types produced by an analysis.

use serde::{Deserialize, Serialize};

/// An uploaded document, alive only for the duration of one request.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub bytes: Vec<u8>,
    /// Declared MIME type, e.g. `text/plain; charset=utf-8`.
    pub content_type: String,
    pub filename: String,
}

/// The model's verdict for one document.
///
/// `confidence` is always within `[0.0, 1.0]`: out-of-range model output is
/// clamped while parsing, never rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: String,
    pub confidence: f64,
    pub suggested_reply: String,
    #[serde(default)]
    pub reasoning: String,
}

/// Remaining request budget for one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateLimitStatus {
    pub limit_5min: usize,
    pub remaining_5min: usize,
    pub limit_24h: usize,
    pub remaining_24h: usize,
}
