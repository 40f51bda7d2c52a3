//! Request pipeline: one uploaded PDF in, anonymized text out.
//!
//! [`Anonymizer`] owns the two external collaborators (text extractor and
//! inference gateway), both constructed once at startup and injected here.
//! It holds no per-request state; every call to [`Anonymizer::anonymize`]
//! stages its own temp file and removes it before returning.

use crate::config::ServiceConfig;
use crate::error::AnonymizerError;
use crate::pipeline::cache::{fingerprint, ResultCache};
use crate::pipeline::extract::TextExtractor;
use crate::pipeline::inference::InferenceGateway;
use crate::pipeline::upload::{persist_scoped, StagedUpload, UploadedDocument};
use crate::prompts::AnonymizationRequest;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of a successful anonymization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnonymizationResult {
    /// Redacted text returned by the model, whitespace-trimmed.
    pub cleaned_text: String,
    /// SHA-256 of the uploaded bytes.
    pub fingerprint: String,
    /// Whether the text came from the result cache.
    pub cached: bool,
    /// Wall-clock time spent on this request.
    pub duration_ms: u64,
}

/// Stateless request processor shared by all HTTP handlers.
pub struct Anonymizer {
    extractor: Arc<dyn TextExtractor>,
    gateway: Arc<dyn InferenceGateway>,
    cache: Option<ResultCache>,
    upload_dir: Option<PathBuf>,
}

impl Anonymizer {
    pub fn new(extractor: Arc<dyn TextExtractor>, gateway: Arc<dyn InferenceGateway>) -> Self {
        Self {
            extractor,
            gateway,
            cache: None,
            upload_dir: None,
        }
    }

    /// Apply the upload directory and cache size from `config`.
    pub fn with_service_config(mut self, config: &ServiceConfig) -> Self {
        self.upload_dir = config.upload_dir.clone();
        self.cache = ResultCache::new(config.cache_capacity);
        self
    }

    /// Validate, stage, extract, prompt and infer.
    ///
    /// # Errors
    /// - [`AnonymizerError::ClientInput`] when the upload is unusable; nothing
    ///   is staged in that case.
    /// - [`AnonymizerError::Extraction`] / [`AnonymizerError::Inference`] when
    ///   a downstream stage fails; the staged file is removed first.
    pub async fn anonymize(
        &self,
        upload: UploadedDocument,
    ) -> Result<AnonymizationResult, AnonymizerError> {
        let start = Instant::now();

        // ── Step 1: Validate ──────────────────────────────────────────────────
        upload.validate()?;
        info!(
            "Anonymizing '{}' ({} bytes)",
            upload.file_name,
            upload.bytes.len()
        );

        // ── Step 2: Cache lookup ──────────────────────────────────────────────
        let fp = fingerprint(&upload.bytes);
        if let Some(ref cache) = self.cache {
            if let Some(cleaned_text) = cache.get(&fp) {
                debug!("Cache hit for {}", fp);
                return Ok(AnonymizationResult {
                    cleaned_text,
                    fingerprint: fp,
                    cached: true,
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }
        }

        // ── Step 3: Stage, extract, infer; always unstage ─────────────────────
        let staged = persist_scoped(&upload.bytes, self.upload_dir.as_ref())?;
        let outcome = self.process_staged(&staged).await;
        staged.remove();
        let cleaned_text = outcome?;

        if let Some(ref cache) = self.cache {
            cache.insert(fp.clone(), cleaned_text.clone());
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        info!("Anonymized '{}' in {}ms", upload.file_name, duration_ms);

        Ok(AnonymizationResult {
            cleaned_text,
            fingerprint: fp,
            cached: false,
            duration_ms,
        })
    }

    async fn process_staged(&self, staged: &StagedUpload) -> Result<String, AnonymizerError> {
        let extractor = Arc::clone(&self.extractor);
        let path = staged.path().to_path_buf();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&path))
            .await
            .map_err(|e| AnonymizerError::Internal(format!("Extraction task panicked: {e}")))??;

        let request = AnonymizationRequest::new(&text);
        Ok(self.gateway.complete(&request).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClientInputError, ExtractionError, InferenceError};
    use crate::prompts::CATEGORY_PREAMBLE;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Records the staged path and whether it existed during extraction.
    #[derive(Default)]
    struct RecordingExtractor {
        seen: Mutex<Vec<(PathBuf, bool)>>,
        fail: bool,
    }

    impl TextExtractor for RecordingExtractor {
        fn extract(&self, path: &Path) -> Result<String, ExtractionError> {
            self.seen
                .lock()
                .unwrap()
                .push((path.to_path_buf(), path.exists()));
            if self.fail {
                return Err(ExtractionError::Corrupt {
                    detail: "bad xref".into(),
                });
            }
            Ok(String::from_utf8_lossy(&std::fs::read(path).unwrap()).into_owned())
        }
    }

    #[derive(Default)]
    struct EchoGateway {
        calls: AtomicUsize,
        prompts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl InferenceGateway for EchoGateway {
        async fn complete(&self, request: &AnonymizationRequest) -> Result<String, InferenceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(request.user.content.clone());
            if self.fail {
                return Err(InferenceError::Network("connection refused".into()));
            }
            Ok("[REDACTED]".into())
        }
    }

    fn pdf_upload(bytes: &[u8]) -> UploadedDocument {
        UploadedDocument::new("cv.pdf", Some("application/pdf".into()), bytes)
    }

    fn anonymizer(
        extractor: Arc<RecordingExtractor>,
        gateway: Arc<EchoGateway>,
        dir: &Path,
        cache: usize,
    ) -> Anonymizer {
        let config = ServiceConfig::builder()
            .upload_dir(dir)
            .cache_capacity(cache)
            .build()
            .unwrap();
        Anonymizer::new(extractor, gateway).with_service_config(&config)
    }

    #[tokio::test]
    async fn success_passes_text_through_prompt_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(RecordingExtractor::default());
        let gateway = Arc::new(EchoGateway::default());
        let a = anonymizer(extractor.clone(), gateway.clone(), dir.path(), 0);

        let result = a.anonymize(pdf_upload(b"%PDF John Doe")).await.unwrap();
        assert_eq!(result.cleaned_text, "[REDACTED]");
        assert!(!result.cached);

        let prompts = gateway.prompts.lock().unwrap();
        assert!(prompts[0].contains("%PDF John Doe"));
        assert!(prompts[0].contains(CATEGORY_PREAMBLE));

        let seen = extractor.seen.lock().unwrap();
        let (path, existed) = &seen[0];
        assert!(*existed, "staged file must exist during extraction");
        assert!(path.starts_with(dir.path()));
        assert!(!path.exists(), "staged file must be removed afterwards");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn invalid_upload_never_reaches_extraction() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(RecordingExtractor::default());
        let gateway = Arc::new(EchoGateway::default());
        let a = anonymizer(extractor.clone(), gateway.clone(), dir.path(), 0);

        let upload = UploadedDocument::new("cv.pdf", Some("text/plain".into()), b"hi".to_vec());
        let err = a.anonymize(upload).await.unwrap_err();
        assert!(matches!(
            err,
            AnonymizerError::ClientInput(ClientInputError::InvalidFileType { .. })
        ));
        assert!(extractor.seen.lock().unwrap().is_empty());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn extraction_failure_cleans_up_and_skips_inference() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(RecordingExtractor {
            fail: true,
            ..Default::default()
        });
        let gateway = Arc::new(EchoGateway::default());
        let a = anonymizer(extractor.clone(), gateway.clone(), dir.path(), 0);

        let err = a.anonymize(pdf_upload(b"%PDF-broken")).await.unwrap_err();
        assert!(matches!(err, AnonymizerError::Extraction(_)));
        assert_eq!(err.status_code(), 500);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn inference_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(RecordingExtractor::default());
        let gateway = Arc::new(EchoGateway {
            fail: true,
            ..Default::default()
        });
        let a = anonymizer(extractor.clone(), gateway, dir.path(), 0);

        let err = a.anonymize(pdf_upload(b"%PDF text")).await.unwrap_err();
        assert!(matches!(err, AnonymizerError::Inference(InferenceError::Network(_))));
        let seen = extractor.seen.lock().unwrap();
        assert!(!seen[0].0.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn cache_serves_repeat_uploads() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(RecordingExtractor::default());
        let gateway = Arc::new(EchoGateway::default());
        let a = anonymizer(extractor, gateway.clone(), dir.path(), 4);

        let first = a.anonymize(pdf_upload(b"%PDF same")).await.unwrap();
        let second = a.anonymize(pdf_upload(b"%PDF same")).await.unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.cleaned_text, second.cleaned_text);
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(RecordingExtractor::default());
        let gateway = Arc::new(EchoGateway {
            fail: true,
            ..Default::default()
        });
        let a = anonymizer(extractor, gateway.clone(), dir.path(), 4);

        assert!(a.anonymize(pdf_upload(b"%PDF x")).await.is_err());
        assert!(a.anonymize(pdf_upload(b"%PDF x")).await.is_err());
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
    }
}
