//! The browser front end driven through its router.
//!
//! The backend is a `wiremock` server standing in for `/process`, so these
//! tests cover what the UI sends and how it renders each kind of answer.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use pdf_anonymizer::client::ProcessClient;
use pdf_anonymizer::ui::{self, UiState, DOWNLOAD_FILE_NAME};
use serde_json::json;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BOUNDARY: &str = "----ui-test-boundary";

// ── Helpers ──────────────────────────────────────────────────────────────────

fn ui_for(backend: &str) -> Router {
    let client = ProcessClient::new(backend, Duration::from_secs(5)).unwrap();
    ui::router(UiState::new(client), 1024 * 1024)
}

fn upload_request(file_name: &str, data: &[u8]) -> Request<Body> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/anonymize")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

// ── POST /anonymize ──────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_is_forwarded_and_result_rendered() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .and(header_regex("content-type", "^multipart/form-data; boundary="))
        .and(body_string_contains(r#"name="file"; filename="cv.pdf""#))
        .and(body_string_contains("Content-Type: application/pdf"))
        .and(body_string_contains("%PDF-1.4 Jane Roe"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "cleaned_text": "[NAME] <Senior Engineer>" })),
        )
        .expect(1)
        .mount(&backend)
        .await;

    let (status, _, page) = send(ui_for(&backend.uri()), upload_request("cv.pdf", b"%PDF-1.4 Jane Roe")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Document processed successfully!"));
    assert!(page.contains("[NAME] &lt;Senior Engineer&gt;"));
    assert!(page.contains(r#"action="/download""#));
}

#[tokio::test]
async fn backend_rejection_is_shown_with_status_and_body() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/process"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "No selected file" })))
        .expect(1)
        .mount(&backend)
        .await;

    let (status, _, page) = send(ui_for(&backend.uri()), upload_request("cv.pdf", b"%PDF-1.4")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("Error: 400 - "), "got: {page}");
    assert!(page.contains("No selected file"));
    assert!(!page.contains("Document processed successfully!"));
}

#[tokio::test]
async fn unreachable_backend_is_reported() {
    let (status, _, page) = send(ui_for("http://127.0.0.1:1"), upload_request("cv.pdf", b"%PDF-1.4")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(page.contains("An error occurred: "), "got: {page}");
    assert!(page.contains("127.0.0.1:1/process"));
}

#[tokio::test]
async fn non_pdf_file_is_not_forwarded() {
    let backend = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&backend)
        .await;

    let (status, _, page) = send(ui_for(&backend.uri()), upload_request("notes.txt", b"hello")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(page.contains("&#39;notes.txt&#39; is not a PDF file"), "got: {page}");
}

// ── POST /download ───────────────────────────────────────────────────────────

#[tokio::test]
async fn download_returns_text_attachment_with_original_line_breaks() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/download")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from("text=%5BNAME%5D%0D%0ASoftware+Engineer%0D%0A"))
        .unwrap();

    let (status, headers, body) = send(ui_for("http://127.0.0.1:1"), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{DOWNLOAD_FILE_NAME}\"").as_str()
    );
    assert_eq!(body, "[NAME]\nSoftware Engineer\n");
}
