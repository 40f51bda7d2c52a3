//! Configuration types for the anonymization service.
//!
//! Two structs cover the two things that need configuring:
//!
//! * [`GatewayConfig`]: how to reach the chat-completion provider: key,
//!   endpoint, model, timeout and retry budget.
//! * [`ServiceConfig`]: how the HTTP endpoint behaves: bind address, where
//!   uploads are staged, upload size limit and result cache size.
//!
//! Both are built through builders whose `build()` validates constraints,
//! so a bad value fails at startup instead of on the first request.

use crate::error::{AnonymizerError, InferenceError};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Groq's OpenAI-compatible API root.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default chat model.
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";

/// Environment variable holding the provider API key.
pub const API_KEY_ENV: &str = "GROQ_API_KEY";

/// Settings for the inference gateway.
///
/// # Example
/// ```rust
/// use pdf_anonymizer::GatewayConfig;
///
/// let config = GatewayConfig::builder("gsk_test")
///     .model("llama-3.1-8b-instant")
///     .request_timeout_secs(30)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 2);
/// ```
#[derive(Clone)]
pub struct GatewayConfig {
    /// Provider API key. Never printed by `Debug`.
    pub api_key: String,

    /// API root; `/chat/completions` is appended. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Sampling temperature. `None` leaves the provider default.
    pub temperature: Option<f32>,

    /// Completion token cap. `None` leaves the provider default.
    pub max_tokens: Option<u32>,

    /// Per-attempt timeout in seconds, covering connect and body. Default: 60.
    pub request_timeout_secs: u64,

    /// Retries after the first attempt for retryable failures. Default: 2.
    pub max_retries: u32,

    /// Base backoff in milliseconds; doubles per retry. Default: 500.
    pub retry_backoff_ms: u64,

    /// Upper bound on any single wait, including provider hints. Default: 10 000.
    pub max_retry_delay_ms: u64,
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_retry_delay_ms", &self.max_retry_delay_ms)
            .finish()
    }
}

impl GatewayConfig {
    /// Start a builder with the given API key and defaults for everything else.
    pub fn builder(api_key: impl Into<String>) -> GatewayConfigBuilder {
        GatewayConfigBuilder {
            config: GatewayConfig {
                api_key: api_key.into(),
                base_url: DEFAULT_BASE_URL.to_string(),
                model: DEFAULT_MODEL.to_string(),
                temperature: None,
                max_tokens: None,
                request_timeout_secs: 60,
                max_retries: 2,
                retry_backoff_ms: 500,
                max_retry_delay_ms: 10_000,
            },
        }
    }

    /// Builder seeded with the key from `GROQ_API_KEY`.
    ///
    /// Fails with [`InferenceError::MissingApiKey`] when it is unset or empty.
    pub fn from_env() -> Result<GatewayConfigBuilder, InferenceError> {
        match std::env::var(API_KEY_ENV) {
            Ok(key) if !key.trim().is_empty() => Ok(Self::builder(key.trim())),
            _ => Err(InferenceError::MissingApiKey),
        }
    }

    /// Full URL of the chat-completions endpoint.
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

/// Builder for [`GatewayConfig`].
#[derive(Debug)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.max_retry_delay_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GatewayConfig, AnonymizerError> {
        let c = &self.config;
        if c.api_key.trim().is_empty() {
            return Err(InferenceError::MissingApiKey.into());
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(AnonymizerError::InvalidConfig(format!(
                "base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if c.model.trim().is_empty() {
            return Err(AnonymizerError::InvalidConfig("model must not be empty".into()));
        }
        if c.request_timeout_secs == 0 {
            return Err(AnonymizerError::InvalidConfig(
                "request timeout must be >= 1s".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Settings for the HTTP endpoint.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address. Default: `0.0.0.0:5000`.
    pub bind_addr: SocketAddr,

    /// Directory for staged uploads. `None` uses the system temp dir.
    pub upload_dir: Option<PathBuf>,

    /// Largest accepted request body in bytes. Default: 25 MiB.
    pub max_upload_bytes: usize,

    /// Number of results kept by upload fingerprint. 0 disables the cache.
    pub cache_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            upload_dir: None,
            max_upload_bytes: 25 * 1024 * 1024,
            cache_capacity: 0,
        }
    }
}

impl ServiceConfig {
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ServiceConfig`].
#[derive(Debug)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfigBuilder {
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.config.bind_addr = addr;
        self
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = Some(dir.into());
        self
    }

    pub fn max_upload_bytes(mut self, n: usize) -> Self {
        self.config.max_upload_bytes = n;
        self
    }

    pub fn cache_capacity(mut self, n: usize) -> Self {
        self.config.cache_capacity = n;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ServiceConfig, AnonymizerError> {
        let c = &self.config;
        if c.max_upload_bytes < 1024 {
            return Err(AnonymizerError::InvalidConfig(format!(
                "upload limit must be >= 1 KiB, got {} bytes",
                c.max_upload_bytes
            )));
        }
        if let Some(ref dir) = c.upload_dir {
            if !dir.is_dir() {
                return Err(AnonymizerError::InvalidConfig(format!(
                    "upload directory '{}' does not exist",
                    dir.display()
                )));
            }
        }
        Ok(self.config)
    }
}
