//! Upload validation and scoped staging.
//!
//! pdfium reads from a file-system path, so each upload is written to a
//! [`NamedTempFile`] for the duration of one request. The temp file is owned
//! by the returned [`StagedUpload`]; dropping it deletes the file, so every
//! exit path of the request (success, `?` on an error, panic unwinding)
//! removes it. [`StagedUpload::remove`] does the same eagerly and reports
//! a failed delete instead of ignoring it.

use crate::error::{AnonymizerError, ClientInputError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// The only content type accepted for uploads.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// A file received from the caller, not yet validated.
#[derive(Debug, Clone)]
pub struct UploadedDocument {
    /// Filename as declared in the multipart part.
    pub file_name: String,
    /// Declared content type, if any.
    pub content_type: Option<String>,
    /// Raw file bytes.
    pub bytes: Vec<u8>,
}

impl UploadedDocument {
    pub fn new(
        file_name: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type,
            bytes: bytes.into(),
        }
    }

    /// Check filename, content type and size, in that order.
    pub fn validate(&self) -> Result<(), ClientInputError> {
        if self.file_name.is_empty() {
            return Err(ClientInputError::NoSelectedFile);
        }
        if !is_pdf_content_type(self.content_type.as_deref()) {
            return Err(ClientInputError::InvalidFileType {
                content_type: self.content_type.clone(),
            });
        }
        if self.bytes.is_empty() {
            return Err(ClientInputError::EmptyFile);
        }
        Ok(())
    }
}

/// `true` for `application/pdf`, ignoring case and any parameters.
pub fn is_pdf_content_type(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|ct| ct.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE))
        .unwrap_or(false)
}

/// An upload written to a uniquely named temporary file.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
}

impl StagedUpload {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now, logging (not failing on) an unsuccessful delete.
    pub fn remove(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Removed staged upload {}", path.display()),
            Err(e) => warn!("Failed to remove staged upload {}: {}", path.display(), e),
        }
    }
}

/// Write `bytes` to a fresh temp file in `dir` (or the system temp dir).
///
/// File names come from `tempfile`'s random generator, so concurrent requests
/// never collide.
pub fn persist_scoped(bytes: &[u8], dir: Option<&PathBuf>) -> Result<StagedUpload, AnonymizerError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("upload-").suffix(".pdf");
    let mut file = match dir {
        Some(d) => builder.tempfile_in(d),
        None => builder.tempfile(),
    }
    .map_err(|source| AnonymizerError::Staging { source })?;

    file.write_all(bytes)
        .and_then(|_| file.flush())
        .map_err(|source| AnonymizerError::Staging { source })?;

    debug!("Staged {} bytes at {}", bytes.len(), file.path().display());
    Ok(StagedUpload { file })
}
