//! HTTP client for the `/process` contract.
//!
//! Used by the web UI to forward uploads to the backend and by the
//! `submit` command. The client sends exactly what a browser form would: a
//! multipart body with one `file` part carrying the filename and content type.

use crate::server::{ProcessResponse, FILE_FIELD};
use reqwest::multipart::{Form, Part};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default backend URL used by the UI and `submit`.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:5000";

/// Failures seen by a `/process` caller.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The backend answered with a non-success status.
    ///
    /// Displays as `<status> - <body>`, the form the UI shows to users.
    #[error("{status} - {body}")]
    Status { status: u16, body: String },

    /// The request never produced a response.
    #[error("Request to {url} failed: {detail}")]
    Transport { url: String, detail: String },

    /// A success response did not carry `cleaned_text`.
    #[error("Unexpected response from backend: {0}")]
    Decode(String),

    /// The client could not be built, or the part was rejected.
    #[error("Invalid request: {0}")]
    Request(String),
}

/// Raw status and body of a `/process` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Posts PDFs to a running backend.
#[derive(Debug, Clone)]
pub struct ProcessClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ProcessClient {
    /// `base_url` is the backend root, e.g. `http://127.0.0.1:5000`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Request(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!("{}/process", base_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send one file and return the anonymized text.
    pub async fn process(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<String, ClientError> {
        let raw = self.process_raw(file_name, content_type, bytes).await?;
        if !(200..300).contains(&raw.status) {
            return Err(ClientError::Status {
                status: raw.status,
                body: raw.body,
            });
        }
        serde_json::from_str::<ProcessResponse>(&raw.body)
            .map(|r| r.cleaned_text)
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    /// Send one file and return the response as received, whatever the status.
    pub async fn process_raw(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<RawResponse, ClientError> {
        let len = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| ClientError::Request(e.to_string()))?;
        let form = Form::new().part(FILE_FIELD, part);

        debug!("POST {} ({} bytes, '{}')", self.endpoint, len, file_name);
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport(e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.transport(e))?;
        Ok(RawResponse { status, body })
    }

    fn transport(&self, e: reqwest::Error) -> ClientError {
        ClientError::Transport {
            url: self.endpoint.clone(),
            detail: e.to_string(),
        }
    }
}
