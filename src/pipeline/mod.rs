//! Pipeline stages for PDF anonymization.
//!
//! Each submodule implements one step of a request.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ cache? ──▶ stage ──▶ extract ──▶ prompt ──▶ inference
//! (validate)  (sha256)  (tempfile) (pdfium)   (fixed)    (chat API)
//! ```
//!
//! 1. [`upload`]: validate the multipart file and stage it in a temp file
//!    that is deleted when the request ends
//! 2. [`cache`]: optional lookup by upload fingerprint
//! 3. [`extract`]: page text via pdfium; runs in `spawn_blocking`
//! 4. [`inference`]: chat-completion call with timeout and bounded retry;
//!    the only stage with network I/O
//!
//! Prompt construction lives in [`crate::prompts`].

pub mod cache;
pub mod extract;
pub mod inference;
pub mod upload;
