//! Pipeline stages from file to verdict.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the network-bound ones ([`ocr`], [`llm`]) sit behind traits.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ pdf ──(no text)──▶ ocr ──┐
//! ingest ────┤                             ├──▶ clean ──▶ llm
//! (.pdf/.txt)└──▶ txt (UTF-8/Latin-1) ─────┘
//! ```
//!
//! 1. [`ingest`] — validate extension/size and drive the extraction order
//! 2. [`pdf`]    — direct text extraction with lopdf (`spawn_blocking`)
//! 3. [`ocr`]    — OCR.space fallback for PDFs without a text layer
//! 4. [`clean`]  — deterministic whitespace/control-character normalisation
//! 5. [`llm`]    — classification call and JSON response parsing

pub mod clean;
pub mod ingest;
pub mod llm;
pub mod ocr;
pub mod pdf;
