//! Direct PDF text extraction via lopdf.
//!
//! ## Why spawn_blocking?
//!
//! Parsing a PDF and decoding its content streams is CPU-bound and may take
//! a noticeable amount of time on large documents. `spawn_blocking` keeps that
//! work off the Tokio worker threads.
//!
//! ## Page failures
//!
//! A page whose content stream cannot be decoded (unknown font encoding,
//! broken stream) contributes no text rather than failing the document; the
//! OCR fallback decides what to do when no page yields anything.

use crate::error::MailsortError;
use lopdf::Document;
use std::path::Path;
use tracing::{debug, info, warn};

/// Extract the embedded text of every page, joined with `'\n'`.
///
/// Returns an empty (or whitespace-only) string for image-only PDFs.
pub async fn extract_text(pdf_path: &Path) -> Result<String, MailsortError> {
    let path = pdf_path.to_path_buf();

    tokio::task::spawn_blocking(move || extract_text_blocking(&path))
        .await
        .map_err(|e| MailsortError::Internal(format!("PDF extraction task panicked: {}", e)))?
}

/// Blocking implementation of text extraction.
pub fn extract_text_blocking(pdf_path: &Path) -> Result<String, MailsortError> {
    let document = Document::load(pdf_path).map_err(|e| MailsortError::CorruptPdf {
        path: pdf_path.to_path_buf(),
        detail: e.to_string(),
    })?;

    let pages = document.get_pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut texts = Vec::with_capacity(pages.len());
    for &page_num in pages.keys() {
        match document.extract_text(&[page_num]) {
            Ok(text) => {
                debug!("Page {}: {} chars of embedded text", page_num, text.len());
                texts.push(text);
            }
            Err(e) => {
                warn!("Page {}: text extraction failed — {}", page_num, e);
                texts.push(String::new());
            }
        }
    }

    Ok(texts.join("\n"))
}

/// Helpers for building small PDFs in tests.
#[cfg(test)]
pub(crate) mod fixtures {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};
    use std::path::Path;

    /// Write a PDF with one page per entry; `None` produces an image-like page
    /// with drawing operators but no text.
    pub fn write_pdf(path: &Path, pages: &[Option<&str>]) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                "F1" => font_id,
            },
        });

        let mut kids: Vec<Object> = Vec::new();
        for page in pages {
            let operations = match page {
                Some(text) => vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
                None => vec![
                    Operation::new("re", vec![10.into(), 10.into(), 100.into(), 100.into()]),
                    Operation::new("f", vec![]),
                ],
            };
            let content = Content { operations };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        let pages_dict = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }
}
