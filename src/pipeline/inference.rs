//! Chat-completion call to the external model.
//!
//! [`InferenceGateway`] is the boundary the request pipeline talks to; the
//! production implementation, [`GroqGateway`], posts the two-message payload
//! to an OpenAI-compatible `/chat/completions` endpoint and returns the first
//! choice's content, trimmed.
//!
//! ## Retry Strategy
//!
//! Every attempt is bounded by `request_timeout_secs`. Network failures,
//! timeouts, HTTP 429 and 5xx responses are retried up to `max_retries`
//! times with exponential backoff (`retry_backoff_ms * 2^(attempt-1)`). A
//! 429 whose body says "try again in Ns" waits that long instead. Every wait
//! is capped at `max_retry_delay_ms`. Authentication failures and other 4xx
//! responses are returned immediately.

use crate::config::GatewayConfig;
use crate::error::InferenceError;
use crate::prompts::{AnonymizationRequest, Message};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Produces anonymized text for a prepared request.
#[async_trait]
pub trait InferenceGateway: Send + Sync {
    /// Run one completion and return its text with surrounding whitespace trimmed.
    async fn complete(&self, request: &AnonymizationRequest) -> Result<String, InferenceError>;
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [&'a Message; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// Gateway for Groq (or any OpenAI-compatible chat-completions API).
///
/// Construct once at startup and share; the inner `reqwest::Client` pools
/// connections across requests.
#[derive(Debug, Clone)]
pub struct GroqGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl GroqGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, InferenceError> {
        if config.api_key.trim().is_empty() {
            return Err(InferenceError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| InferenceError::ClientBuild(format!("invalid API key: {e}")))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| InferenceError::ClientBuild(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// One HTTP round trip, no retries.
    async fn send_once(&self, request: &AnonymizationRequest) -> Result<String, InferenceError> {
        let body = ChatCompletionRequest {
            model: &self.config.model,
            messages: request.messages(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(self.config.chat_completions_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &text));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.classify_transport(e)
            } else {
                InferenceError::MalformedResponse(e.to_string())
            }
        })?;

        if let Some(usage) = &parsed.usage {
            debug!(
                "{} prompt tokens, {} completion tokens",
                usage.prompt_tokens, usage.completion_tokens
            );
        }

        first_completion(parsed)
    }

    fn classify_transport(&self, e: reqwest::Error) -> InferenceError {
        if e.is_timeout() {
            InferenceError::Timeout {
                secs: self.config.request_timeout_secs,
            }
        } else {
            InferenceError::Network(e.to_string())
        }
    }

    /// Wait before retry number `attempt` (1-based).
    fn backoff_for(&self, attempt: u32, err: &InferenceError) -> Duration {
        let exponential = self
            .config
            .retry_backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
        let ms = err.retry_after_ms().unwrap_or(exponential);
        Duration::from_millis(ms.min(self.config.max_retry_delay_ms))
    }
}

#[async_trait]
impl InferenceGateway for GroqGateway {
    async fn complete(&self, request: &AnonymizationRequest) -> Result<String, InferenceError> {
        let start = Instant::now();
        let mut attempt = 0u32;

        loop {
            match self.send_once(request).await {
                Ok(text) => {
                    info!(
                        "Completion from {} in {:?} ({} retries, {} chars)",
                        self.config.model,
                        start.elapsed(),
                        attempt,
                        text.len()
                    );
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let wait = self.backoff_for(attempt, &e);
                    warn!(
                        "Inference attempt {} failed: {}; retry {}/{} in {:?}",
                        attempt, e, attempt, self.config.max_retries, wait
                    );
                    sleep(wait).await;
                }
                Err(e) => {
                    warn!("Inference failed after {} attempts: {}", attempt + 1, e);
                    return Err(e);
                }
            }
        }
    }
}

/// Map a non-success HTTP status and body to an error kind.
fn classify_status(status: u16, body: &str) -> InferenceError {
    let detail = provider_message(body);
    match status {
        401 | 403 => InferenceError::Authentication { status, detail },
        429 => InferenceError::RateLimited {
            retry_after_secs: retry_hint_secs(body),
        },
        _ => InferenceError::Api {
            status,
            message: detail,
        },
    }
}

/// Pull `error.message` out of an OpenAI-style error body, else the raw body.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

static RETRY_HINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"try again in (?:(\d+)m)?(\d+(?:\.\d+)?)s").expect("valid regex"));

/// Parse Groq's "Please try again in 1m2.5s" hint into seconds.
fn retry_hint_secs(body: &str) -> Option<f64> {
    let caps = RETRY_HINT.captures(body)?;
    let minutes: f64 = caps
        .get(1)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0.0);
    let seconds: f64 = caps.get(2)?.as_str().parse().ok()?;
    Some(minutes * 60.0 + seconds)
}

fn first_completion(response: ChatCompletionResponse) -> Result<String, InferenceError> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or(InferenceError::EmptyResponse)?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(InferenceError::EmptyResponse);
    }
    Ok(trimmed.to_string())
}
