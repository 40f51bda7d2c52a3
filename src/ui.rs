//! Browser front end.
//!
//! A small server-rendered page that takes a PDF from the user, forwards it
//! to the backend's `/process` endpoint with [`ProcessClient`], and shows the
//! anonymized text with a download button. It holds nothing between requests:
//! the text travels back to `/download` inside the result page's form.
//!
//! ## Routes
//!
//! - `GET /`: upload form.
//! - `POST /anonymize`: multipart `file`; renders the result or the error.
//! - `POST /download`: form field `text`; returns it as `anonymized_text.txt`.

use crate::client::{ClientError, ProcessClient};
use crate::pipeline::upload::PDF_CONTENT_TYPE;
use crate::server::FILE_FIELD;
use axum::extract::{DefaultBodyLimit, Form, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Filename offered by the download button.
pub const DOWNLOAD_FILE_NAME: &str = "anonymized_text.txt";

#[derive(Clone)]
pub struct UiState {
    pub client: Arc<ProcessClient>,
}

impl UiState {
    pub fn new(client: ProcessClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DownloadForm {
    pub text: String,
}

pub fn router(state: UiState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/anonymize", post(anonymize))
        .route("/download", post(download))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /`
pub async fn index() -> Html<String> {
    render_page("")
}

/// `POST /anonymize`
pub async fn anonymize(State(state): State<UiState>, multipart: Multipart) -> Response {
    let (file_name, bytes) = match read_pdf_field(multipart).await {
        Ok(file) => file,
        Err(message) => {
            warn!("UI upload rejected: {}", message);
            return (StatusCode::BAD_REQUEST, render_page(&error_block(&message))).into_response();
        }
    };

    info!("Forwarding '{}' ({} bytes) to {}", file_name, bytes.len(), state.client.endpoint());
    match state.client.process(&file_name, PDF_CONTENT_TYPE, bytes).await {
        Ok(cleaned_text) => render_page(&result_block(&cleaned_text)).into_response(),
        Err(e @ ClientError::Status { .. }) => {
            error!("Server response: {}", e);
            render_page(&error_block(&format!("Error: {e}"))).into_response()
        }
        Err(e) => {
            error!("Processing error: {}", e);
            render_page(&error_block(&format!("An error occurred: {e}"))).into_response()
        }
    }
}

/// `POST /download`
///
/// Form submission sends line breaks as CRLF; they are turned back into the
/// LF the backend returned so the file matches the displayed text.
pub async fn download(Form(form): Form<DownloadForm>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{DOWNLOAD_FILE_NAME}\""),
            ),
        ],
        form.text.replace("\r\n", "\n"),
    )
}

/// The uploaded file's name and bytes; only `.pdf` names are accepted.
async fn read_pdf_field(mut multipart: Multipart) -> Result<(String, Vec<u8>), String> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| format!("Could not read upload: {}", e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            break;
        }
        if !has_pdf_extension(&file_name) {
            return Err(format!("'{file_name}' is not a PDF file"));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| format!("Could not read upload: {}", e.body_text()))?;
        return Ok((file_name, bytes.to_vec()));
    }
    Err("Choose a PDF file first".to_string())
}

fn has_pdf_extension(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Escape text for an HTML body or attribute value.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn error_block(message: &str) -> String {
    format!(r#"<div class="error-message">{}</div>"#, escape_html(message))
}

fn result_block(cleaned_text: &str) -> String {
    let text = escape_html(cleaned_text);
    format!(
        r#"<div class="success-message">✅ Document processed successfully!</div>
<h3>📝 Anonymized Text</h3>
<textarea readonly rows="16">
{text}</textarea>
<form method="post" action="/download">
  <input type="hidden" name="text" value="{text}">
  <button type="submit">📥 Download Anonymized Text</button>
</form>"#
    )
}

fn render_page(outcome: &str) -> Html<String> {
    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>PDF Text Anonymizer</title>
<style>
body {{ font-family: sans-serif; max-width: 50rem; margin: 0 auto; padding: 2rem; }}
h1 {{ color: #2E4057; text-align: center; margin-bottom: 2rem; }}
.cards {{ display: flex; gap: 1rem; margin: 2rem 0; }}
.card {{ background: #2E4057; color: #fff; padding: 1rem; border-radius: 5px; flex: 1; }}
.upload-section {{ background: #f8f9fa; padding: 2rem; border-radius: 10px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }}
button {{ background: #2E4057; color: #fff; border: 0; border-radius: 5px; padding: 0.5rem 1rem; font-weight: 500; }}
.success-message {{ padding: 1rem; border-radius: 5px; background: #d4edda; color: #155724; margin: 1rem 0; }}
.error-message {{ padding: 1rem; border-radius: 5px; background: #f8d7da; color: #721c24; margin: 1rem 0; }}
textarea {{ width: 100%; }}
footer {{ text-align: center; margin-top: 2rem; padding: 1rem; color: #6c757d; }}
</style>
</head>
<body>
<h1>📄 Resume Anonymizer</h1>
<div class="cards">
  <div class="card">
    <h4>🔒 Secure Processing</h4>
    <p>Your documents are processed securely and deleted immediately after processing.</p>
  </div>
  <div class="card">
    <h4>🤖 AI-Powered</h4>
    <p>Advanced AI technology ensures accurate identification and anonymization of sensitive data.</p>
  </div>
</div>
<div class="upload-section">
  <form method="post" action="/anonymize" enctype="multipart/form-data">
    <label for="file">Choose a PDF file</label>
    <input id="file" type="file" name="file" accept=".pdf,application/pdf" required>
    <button type="submit">Anonymize</button>
  </form>
  {outcome}
</div>
<footer><p>Made with ❤️ for privacy and security</p></footer>
</body>
</html>
"#
    ))
}

/// Bind `addr` and serve the UI until Ctrl-C or SIGTERM.
pub async fn serve(addr: SocketAddr, state: UiState, max_upload_bytes: usize) -> std::io::Result<()> {
    let app = router(state, max_upload_bytes);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("UI listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(crate::server::shutdown_signal())
        .await
}
