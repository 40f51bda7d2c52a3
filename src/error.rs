//! Error types for the pdf-anonymizer library.
//!
//! Failures fall into three kinds, each with its own enum:
//!
//! * [`ClientInputError`]: the caller sent something unusable (no file,
//!   empty filename, wrong content type). Reported as HTTP 400; the caller
//!   can fix the request and resubmit.
//!
//! * [`ExtractionError`]: the upload could not be turned into text
//!   (unparseable PDF, encrypted document, no text layer). Reported as 500.
//!
//! * [`InferenceError`]: the external chat-completion call failed (network,
//!   timeout, bad credentials, provider-side error). Reported as 500 after the
//!   gateway's own retry budget is spent.
//!
//! [`AnonymizerError`] wraps all three so the request pipeline has a single
//! `Result` type and the HTTP layer a single conversion point.

use thiserror::Error;

/// Top-level error returned by [`crate::anonymize::Anonymizer`].
#[derive(Debug, Error)]
pub enum AnonymizerError {
    #[error(transparent)]
    ClientInput(#[from] ClientInputError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// The upload could not be written to its temporary location.
    #[error("Failed to stage upload: {source}")]
    Staging {
        #[source]
        source: std::io::Error,
    },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unexpected internal error (e.g. a panicked blocking task).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnonymizerError {
    /// HTTP status code for this error: 400 for caller mistakes, 500 otherwise.
    pub fn status_code(&self) -> u16 {
        match self {
            AnonymizerError::ClientInput(_) => 400,
            _ => 500,
        }
    }

    /// `true` when the caller can fix the request and resubmit.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}

/// Problems with the uploaded request itself.
///
/// The first three messages are part of the HTTP contract and must not change.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientInputError {
    /// No multipart field named `file` carried a file.
    #[error("No file uploaded")]
    NoFileUploaded,

    /// The `file` field was present but its filename was empty.
    #[error("No selected file")]
    NoSelectedFile,

    /// The declared content type was not `application/pdf`.
    #[error("Invalid file type. Please upload a PDF file")]
    InvalidFileType { content_type: Option<String> },

    /// The file carried zero bytes.
    #[error("Uploaded file is empty")]
    EmptyFile,

    /// The multipart body could not be read.
    #[error("Malformed multipart upload: {0}")]
    MalformedUpload(String),
}

/// Failures while turning PDF bytes into text.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    /// The file does not start with the `%PDF` signature.
    #[error("File is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { magic: Vec<u8> },

    /// The PDF library rejected the document.
    #[error("Failed to parse PDF: {detail}")]
    Corrupt { detail: String },

    /// The document is encrypted with a user password.
    #[error("PDF is encrypted and requires a password")]
    PasswordRequired,

    /// A single page's text layer could not be read.
    #[error("Failed to read text of page {page}: {detail}")]
    PageText { page: usize, detail: String },

    /// Every page was read but none contained text (e.g. a scanned document).
    #[error("PDF contains no extractable text ({pages} pages scanned)")]
    NoText { pages: usize },

    /// The PDF engine itself is unavailable.
    #[error("PDF engine unavailable: {0}")]
    Engine(String),
}

/// Failures of the external chat-completion call.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    /// No API key was configured. Fatal at startup.
    #[error("Missing GROQ API key! Set GROQ_API_KEY in the environment.")]
    MissingApiKey,

    /// The HTTP client could not be constructed.
    #[error("Failed to build inference client: {0}")]
    ClientBuild(String),

    /// Connection-level failure (DNS, refused, reset).
    #[error("Network error contacting inference API: {0}")]
    Network(String),

    /// The call exceeded the configured request timeout.
    #[error("Inference API call timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The provider rejected the credentials (HTTP 401/403).
    #[error("Authentication with inference API failed (HTTP {status}): {detail}")]
    Authentication { status: u16, detail: String },

    /// HTTP 429.
    #[error("Inference API rate limit exceeded")]
    RateLimited { retry_after_secs: Option<f64> },

    /// Any other non-success status from the provider.
    #[error("Inference API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The response body did not match the chat-completion schema.
    #[error("Malformed inference API response: {0}")]
    MalformedResponse(String),

    /// The response held no completion text.
    #[error("Inference API returned no completion")]
    EmptyResponse,
}

impl InferenceError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            InferenceError::Network(_)
            | InferenceError::Timeout { .. }
            | InferenceError::RateLimited { .. } => true,
            InferenceError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Provider-suggested delay before the next attempt, in milliseconds.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            InferenceError::RateLimited {
                retry_after_secs: Some(secs),
            } => Some((secs * 1000.0).ceil() as u64),
            _ => None,
        }
    }
}
