//! Page-level text extraction.
//!
//! [`TextExtractor`] is the seam between the request pipeline and the PDF
//! library. The production implementation, [`PdfiumExtractor`], reads each
//! page's text layer through pdfium and joins pages with a line break in
//! document order. No OCR and no layout reconstruction happen here: what
//! pdfium returns for a page is what the caller gets.
//!
//! Extraction is synchronous and CPU-bound; callers run it inside
//! `tokio::task::spawn_blocking`.

use crate::error::ExtractionError;
use pdfium_render::prelude::*;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Separator placed between consecutive pages.
pub const PAGE_SEPARATOR: &str = "\n";

/// Turns a PDF on disk into plain text.
pub trait TextExtractor: Send + Sync {
    /// Concatenated text of every page, in page order.
    fn extract(&self, path: &Path) -> Result<String, ExtractionError>;
}

/// Extractor backed by a shared pdfium binding.
#[derive(Clone)]
pub struct PdfiumExtractor {
    pdfium: Arc<Pdfium>,
}

impl PdfiumExtractor {
    pub fn new(pdfium: Arc<Pdfium>) -> Self {
        Self { pdfium }
    }
}

impl TextExtractor for PdfiumExtractor {
    fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
        check_pdf_signature(path)?;

        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(classify_load_error)?;

        let pages = document.pages();
        let mut texts = Vec::with_capacity(pages.len() as usize);
        for (idx, page) in pages.iter().enumerate() {
            let text = page
                .text()
                .map_err(|e| ExtractionError::PageText {
                    page: idx + 1,
                    detail: format!("{e:?}"),
                })?
                .all();
            debug!("Page {}: {} chars", idx + 1, text.chars().count());
            texts.push(text);
        }

        let page_count = texts.len();
        let joined = join_pages(texts);
        if joined.trim().is_empty() {
            return Err(ExtractionError::NoText { pages: page_count });
        }
        info!("Extracted {} chars from {} pages", joined.len(), page_count);
        Ok(joined)
    }
}

/// Join page texts with [`PAGE_SEPARATOR`], preserving order.
pub fn join_pages<I, S>(pages: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    for (i, page) in pages.into_iter().enumerate() {
        if i > 0 {
            out.push_str(PAGE_SEPARATOR);
        }
        out.push_str(page.as_ref());
    }
    out
}

/// Reject files that do not start with `%PDF` before handing them to pdfium.
fn check_pdf_signature(path: &Path) -> Result<(), ExtractionError> {
    let mut file = std::fs::File::open(path).map_err(|e| ExtractionError::Corrupt {
        detail: format!("cannot open staged file: {e}"),
    })?;
    let mut magic = Vec::with_capacity(4);
    file.by_ref()
        .take(4)
        .read_to_end(&mut magic)
        .map_err(|e| ExtractionError::Corrupt {
            detail: format!("cannot read staged file: {e}"),
        })?;
    if magic != b"%PDF" {
        return Err(ExtractionError::NotAPdf { magic });
    }
    Ok(())
}

fn classify_load_error(e: PdfiumError) -> ExtractionError {
    let detail = format!("{e:?}");
    if detail.to_ascii_lowercase().contains("password") {
        ExtractionError::PasswordRequired
    } else {
        ExtractionError::Corrupt { detail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_pages_keeps_order_with_line_breaks() {
        assert_eq!(join_pages(["one", "two", "three"]), "one\ntwo\nthree");
        assert_eq!(join_pages(["solo"]), "solo");
        assert_eq!(join_pages(Vec::<String>::new()), "");
    }

    #[test]
    fn join_pages_keeps_empty_pages_as_blank_lines() {
        assert_eq!(join_pages(["a", "", "c"]), "a\n\nc");
    }

    #[test]
    fn signature_check_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"hello world").unwrap();
        match check_pdf_signature(&path) {
            Err(ExtractionError::NotAPdf { magic }) => assert_eq!(magic, b"hell"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn signature_check_handles_short_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.pdf");
        std::fs::write(&path, b"%P").unwrap();
        assert!(matches!(
            check_pdf_signature(&path),
            Err(ExtractionError::NotAPdf { .. })
        ));

        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        assert!(check_pdf_signature(&path).is_ok());
    }
}
