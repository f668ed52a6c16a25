//! # mailsort
//!
//! Classify uploaded e-mails (PDF or plain text) with a generative language
//! model and suggest a reply.
//!
//! ## Why this crate?
//!
//! The model call is the easy part. Getting clean text out of what users
//! actually upload is not: PDFs exported from mail clients carry a text layer,
//! scanned letters do not, and legacy `.txt` files are often Latin-1. This
//! crate tries direct extraction first, falls back to OCR only when a PDF
//! has no text at all, normalises the result, and parses the model's
//! semi-structured JSON answer defensively.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload
//!  │
//!  ├─ 1. Gatekeeper  rate limit per client, content type, upload size
//!  ├─ 2. Ingest      .txt (UTF-8 / Latin-1) or .pdf (lopdf, OCR fallback)
//!  ├─ 3. Clean       strip control characters, collapse whitespace
//!  ├─ 4. Screen      length limit, SQL / script denylist
//!  ├─ 5. Classify    one LLM call, first complete JSON object parsed
//!  └─ 6. Respond     category, confidence, suggested reply, reasoning
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mailsort::{Analyzer, MailsortConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GEMINI_API_KEY, GEMINI_MODEL and optionally OCR_SPACE_API_KEY
//!     let config = MailsortConfig::from_env()?;
//!     let analyzer = Analyzer::from_config(&config)?;
//!     let result = analyzer.analyze_file("mail.pdf".as_ref()).await?;
//!     println!("{} ({:.2})", result.category, result.confidence);
//!     println!("{}", result.suggested_reply);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `mailsort` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod analyze;
pub mod config;
pub mod error;
pub mod gatekeeper;
pub mod output;
pub mod pipeline;
pub mod prompts;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use analyze::{resolve_provider, Analyzer, ALLOWED_CONTENT_TYPES};
pub use config::{Environment, MailsortConfig, MailsortConfigBuilder};
pub use error::{ErrorKind, MailsortError};
pub use gatekeeper::RateLimiter;
pub use output::{ClassificationResult, RateLimitStatus, UploadedDocument};
pub use pipeline::ingest::{Ingestor, SUPPORTED_EXTENSIONS};
pub use pipeline::llm::{parse_classification, Classifier, TextGenerator};
pub use pipeline::ocr::{OcrEngine, OcrSpaceClient};
pub use server::{create_router, serve, AppState};
