//! HTTP surface of the anonymization service.
//!
//! ## Routes
//!
//! - `POST /process`: multipart form with a `file` field. Returns
//!   `{"cleaned_text": "..."}` on success, `{"error": "..."}` with 400 for
//!   caller mistakes and 500 for extraction or inference failures.
//! - `OPTIONS /process`: CORS preflight, empty body, no processing.
//! - `GET /health`: `{"status": "ok"}`.
//!
//! ## CORS
//!
//! Any origin may call the API. [`CorsLayer`] sits on the `POST` handler only
//! and stamps `Access-Control-Allow-Origin` / `-Expose-Headers` on its
//! responses. It is kept off `OPTIONS` because tower-http answers every
//! `OPTIONS` itself; [`preflight`] owns that method instead and returns the
//! full policy (methods, headers, max-age) in one place.

use crate::anonymize::Anonymizer;
use crate::config::ServiceConfig;
use crate::error::{AnonymizerError, ClientInputError};
use crate::pipeline::upload::UploadedDocument;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::header;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

/// Name of the multipart field carrying the PDF.
pub const FILE_FIELD: &str = "file";

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub anonymizer: Arc<Anonymizer>,
}

impl AppState {
    pub fn new(anonymizer: Anonymizer) -> Self {
        Self {
            anonymizer: Arc::new(anonymizer),
        }
    }
}

/// Success body of `POST /process`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessResponse {
    pub cleaned_text: String,
}

/// Failure body of `POST /process`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for AnonymizerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the service router.
pub fn router(state: AppState, config: &ServiceConfig) -> Router {
    Router::new()
        .route(
            "/process",
            post(process).layer(cors_layer()).options(preflight),
        )
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Seconds a browser may cache a preflight answer.
const PREFLIGHT_MAX_AGE_SECS: u64 = 120;

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .expose_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .max_age(Duration::from_secs(PREFLIGHT_MAX_AGE_SECS))
}

/// `POST /process`
pub async fn process(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessResponse>, AnonymizerError> {
    debug!("Received /process request");

    let outcome = match read_upload(multipart).await {
        Ok(upload) => state.anonymizer.anonymize(upload).await,
        Err(e) => Err(e.into()),
    };

    match outcome {
        Ok(result) => Ok(Json(ProcessResponse {
            cleaned_text: result.cleaned_text,
        })),
        Err(e) if e.is_client_error() => {
            warn!("Rejected upload: {}", e);
            Err(e)
        }
        Err(e) => {
            error!("Error processing PDF: {}", e);
            Err(e)
        }
    }
}

/// `OPTIONS /process`
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_HEADERS,
                HeaderValue::from_static("Content-Type,Authorization,Accept"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("POST,OPTIONS"),
            ),
            (
                header::ACCESS_CONTROL_MAX_AGE,
                HeaderValue::from(PREFLIGHT_MAX_AGE_SECS),
            ),
        ],
    )
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Pull the first `file` field out of the form.
///
/// A body that is not multipart at all, a form without a `file` field, and a
/// `file` field that is a plain value (no filename attribute) are all "no
/// file uploaded". A file part with an empty filename is kept so validation
/// reports "no selected file".
async fn read_upload(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadedDocument, ClientInputError> {
    let mut multipart = match multipart {
        Ok(m) => m,
        Err(rejection) => {
            debug!("Not a multipart request: {}", rejection.body_text());
            return Err(ClientInputError::NoFileUploaded);
        }
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ClientInputError::MalformedUpload(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let Some(file_name) = field.file_name().map(str::to_string) else {
            return Err(ClientInputError::NoFileUploaded);
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ClientInputError::MalformedUpload(e.body_text()))?;
        return Ok(UploadedDocument::new(file_name, content_type, bytes.to_vec()));
    }

    Err(ClientInputError::NoFileUploaded)
}

/// Bind `config.bind_addr` and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: ServiceConfig, anonymizer: Anonymizer) -> std::io::Result<()> {
    let app = router(AppState::new(anonymizer), &config);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutting down");
}
