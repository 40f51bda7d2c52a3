//! # pdf-anonymizer
//!
//! Strip personal data from PDF documents with a hosted LLM.
//!
//! ## Why this crate?
//!
//! Résumés and similar documents are full of names, phone numbers and
//! addresses mixed into free text. Pattern-based redaction misses most of
//! them and mangles the rest. Instead this crate pulls the text layer out of
//! the PDF and asks a chat model to rewrite it with every piece of personal
//! information removed or replaced, keeping the professional content intact.
//!
//! ## Pipeline Overview
//!
//! ```text
//! multipart upload
//!  │
//!  ├─ 1. Validate  file present, named, application/pdf, non-empty
//!  ├─ 2. Stage     scoped temp file, removed on every exit path
//!  ├─ 3. Extract   page text via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 4. Prompt    fixed system message + category list + text
//!  └─ 5. Infer     Groq chat completion, timeout + bounded retry
//!        │
//!        ▼
//!  {"cleaned_text": "..."}  or  {"error": "..."} (400 / 500)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_anonymizer::{
//!     server, Anonymizer, GatewayConfig, GroqGateway, PdfiumExtractor, ServiceConfig,
//! };
//! use pdfium_auto::FetchPolicy;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GROQ_API_KEY
//!     let gateway = GroqGateway::new(GatewayConfig::from_env()?.build()?)?;
//!     let pdfium = pdfium_auto::shared(FetchPolicy::Download)?;
//!     let service = ServiceConfig::default();
//!
//!     let anonymizer = Anonymizer::new(
//!         Arc::new(PdfiumExtractor::new(pdfium)),
//!         Arc::new(gateway),
//!     )
//!     .with_service_config(&service);
//!
//!     server::serve(service, anonymizer).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf-anonymizer` binary (clap + anyhow + tracing-subscriber + dotenvy) |
//!
//! Disable `cli` when embedding only the library:
//! ```toml
//! pdf-anonymizer = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod anonymize;
pub mod client;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod prompts;
pub mod server;
pub mod ui;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use anonymize::{AnonymizationResult, Anonymizer};
pub use client::{ClientError, ProcessClient};
pub use config::{GatewayConfig, GatewayConfigBuilder, ServiceConfig, ServiceConfigBuilder};
pub use error::{AnonymizerError, ClientInputError, ExtractionError, InferenceError};
pub use pipeline::extract::{PdfiumExtractor, TextExtractor};
pub use pipeline::inference::{GroqGateway, InferenceGateway};
pub use pipeline::upload::UploadedDocument;
pub use prompts::AnonymizationRequest;
