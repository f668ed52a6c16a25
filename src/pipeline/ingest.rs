//! File ingestion: turn a `.pdf` or `.txt` file into normalised text.
//!
//! ## PDF extraction order
//!
//! PDFs go through a fixed attempt sequence:
//!
//! ```text
//! Direct ──(text found)──────────────────────────▶ done
//!    │
//!    └─(no text)──▶ Ocr ──(engine configured)────▶ done / OcrFailed
//!                     └──(no engine)─────────────▶ OcrNotConfigured
//! ```
//!
//! OCR is billed per call and slow, so it is only reached when the PDF has no
//! text layer at all, and then exactly once.

use crate::config::MailsortConfig;
use crate::error::{to_mb, MailsortError};
use crate::pipeline::clean::clean_text;
use crate::pipeline::ocr::{OcrEngine, OcrSpaceClient};
use crate::pipeline::pdf;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File extensions the pipeline accepts (lower-case, with the dot).
pub const SUPPORTED_EXTENSIONS: [&str; 2] = [".pdf", ".txt"];

/// One step of PDF text extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Direct,
    Ocr,
}

const PDF_ATTEMPTS: [Attempt; 2] = [Attempt::Direct, Attempt::Ocr];

/// Reads supported files and returns cleaned text.
pub struct Ingestor {
    max_file_bytes: u64,
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl Ingestor {
    pub fn new(max_file_bytes: u64, ocr: Option<Arc<dyn OcrEngine>>) -> Self {
        Self {
            max_file_bytes,
            ocr,
        }
    }

    /// Build from configuration, wiring OCR.space when a key is present.
    pub fn from_config(config: &MailsortConfig) -> Self {
        let ocr = OcrSpaceClient::from_config(config).map(|c| Arc::new(c) as Arc<dyn OcrEngine>);
        if ocr.is_none() {
            warn!("OCR_SPACE_API_KEY not set: scanned PDFs will be rejected");
        }
        Self::new(config.max_file_bytes, ocr)
    }

    /// Extract and clean the text of `path`.
    ///
    /// Checks run in order: extension, existence, size.
    pub async fn ingest(&self, path: &Path) -> Result<String, MailsortError> {
        let extension = extension_of(path);
        if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Err(MailsortError::UnsupportedExtension {
                extension,
                supported: SUPPORTED_EXTENSIONS.join(", "),
            });
        }

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| MailsortError::FileNotFound {
                path: path.to_path_buf(),
            })?;
        if !metadata.is_file() {
            return Err(MailsortError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        if metadata.len() > self.max_file_bytes {
            return Err(MailsortError::FileTooLarge {
                size_mb: to_mb(metadata.len()),
                max_mb: to_mb(self.max_file_bytes),
            });
        }

        info!("Ingesting {} ({} bytes)", path.display(), metadata.len());
        let raw = match extension.as_str() {
            ".pdf" => self.extract_pdf(path).await?,
            _ => read_txt(path).await?,
        };

        let cleaned = clean_text(&raw);
        debug!("Cleaned text: {} → {} chars", raw.chars().count(), cleaned.chars().count());
        Ok(cleaned)
    }

    async fn extract_pdf(&self, path: &Path) -> Result<String, MailsortError> {
        for attempt in PDF_ATTEMPTS {
            match attempt {
                Attempt::Direct => {
                    let text = pdf::extract_text(path).await?;
                    if !text.trim().is_empty() {
                        info!("PDF has a text layer; OCR not needed");
                        return Ok(text);
                    }
                    info!("PDF has no extractable text; falling back to OCR");
                }
                Attempt::Ocr => {
                    let engine = self.ocr.as_ref().ok_or(MailsortError::OcrNotConfigured)?;
                    return engine.extract_text(path).await;
                }
            }
        }
        Err(MailsortError::OcrNotConfigured)
    }
}

/// Lower-cased extension including the leading dot, or `""`.
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Read a text file as UTF-8, falling back to Latin-1 (every byte maps to the
/// code point of the same value, so this never fails).
async fn read_txt(path: &Path) -> Result<String, MailsortError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| MailsortError::Internal(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(decode_text(bytes))
}

pub(crate) fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            debug!("File is not valid UTF-8; decoding as Latin-1");
            e.into_bytes().iter().map(|&b| b as char).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::pdf::fixtures::write_pdf;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// OCR stand-in that counts calls and returns fixed text.
    struct CountingOcr {
        calls: AtomicUsize,
        text: &'static str,
    }

    impl CountingOcr {
        fn new(text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                text,
            })
        }
    }

    #[async_trait]
    impl OcrEngine for CountingOcr {
        async fn extract_text(&self, _pdf_path: &Path) -> Result<String, MailsortError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.text.to_string())
        }
    }

    fn ingestor_with(ocr: &Arc<CountingOcr>) -> Ingestor {
        Ingestor::new(10 * 1024 * 1024, Some(Arc::clone(ocr) as Arc<dyn OcrEngine>))
    }

    // ── Text files ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn txt_is_read_and_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.txt");
        std::fs::write(&path, "  Olá,\n\n  equipe\tde suporte  ").unwrap();

        let text = Ingestor::new(1024, None).ingest(&path).await.unwrap();
        assert_eq!(text, "Olá, equipe de suporte");
    }

    #[tokio::test]
    async fn txt_latin1_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.TXT");
        // "café ação" in ISO-8859-1
        std::fs::write(&path, b"caf\xe9 a\xe7\xe3o").unwrap();

        let text = Ingestor::new(1024, None).ingest(&path).await.unwrap();
        assert_eq!(text, "café ação");
    }

    #[test]
    fn decode_never_fails() {
        let all: Vec<u8> = (0u8..=255).collect();
        assert_eq!(decode_text(all).chars().count(), 256);
    }

    // ── Validation ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn unsupported_extension_names_supported_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("letter.docx");
        std::fs::write(&path, "x").unwrap();

        let err = Ingestor::new(1024, None).ingest(&path).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(".docx"), "got: {msg}");
        assert!(msg.contains(".pdf, .txt"), "got: {msg}");
    }

    #[tokio::test]
    async fn extension_checked_before_existence() {
        let err = Ingestor::new(1024, None)
            .ingest(Path::new("/nonexistent/file.doc"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailsortError::UnsupportedExtension { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = Ingestor::new(1024, None)
            .ingest(Path::new("/nonexistent/file.txt"))
            .await
            .unwrap_err();
        assert!(matches!(err, MailsortError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn oversized_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        std::fs::write(&path, vec![b'a'; 2048]).unwrap();

        let err = Ingestor::new(1024, None).ingest(&path).await.unwrap_err();
        assert!(matches!(err, MailsortError::FileTooLarge { .. }), "got: {err:?}");
    }

    // ── PDF attempt sequence ─────────────────────────────────────────────

    #[tokio::test]
    async fn pdf_with_text_never_calls_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mail.pdf");
        write_pdf(&path, &[Some("Pedido de suporte"), Some("Numero 42")]);

        let ocr = CountingOcr::new("ocr text");
        let text = ingestor_with(&ocr).ingest(&path).await.unwrap();
        assert!(text.contains("Pedido de suporte"), "got: {text:?}");
        assert!(text.contains("Numero 42"), "got: {text:?}");
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scanned_pdf_without_ocr_is_not_configured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        write_pdf(&path, &[None]);

        let err = Ingestor::new(1024 * 1024, None).ingest(&path).await.unwrap_err();
        assert!(matches!(err, MailsortError::OcrNotConfigured), "got: {err:?}");
        assert!(err.to_string().contains("OCR_SPACE_API_KEY"));
    }

    #[tokio::test]
    async fn scanned_pdf_calls_ocr_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        write_pdf(&path, &[None, None]);

        let ocr = CountingOcr::new("Texto   extraido\npor OCR");
        let text = ingestor_with(&ocr).ingest(&path).await.unwrap();
        assert_eq!(text, "Texto extraido por OCR");
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn corrupt_pdf_does_not_reach_ocr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"not a pdf at all").unwrap();

        let ocr = CountingOcr::new("ocr text");
        let err = ingestor_with(&ocr).ingest(&path).await.unwrap_err();
        assert!(matches!(err, MailsortError::CorruptPdf { .. }), "got: {err:?}");
        assert_eq!(ocr.calls.load(Ordering::SeqCst), 0);
    }
}
