//! Configuration for the mailsort service.
//!
//! Every knob lives in [`MailsortConfig`], built via its
//! [`MailsortConfigBuilder`] or loaded from the process environment with
//! [`MailsortConfig::from_env`]. Limits default to the values the service
//! has always enforced, so a deployment only needs to provide credentials.
//!
//! # Environment
//!
//! | Variable | Required | Default |
//! |----------|----------|---------|
//! | `GEMINI_API_KEY` | yes | — |
//! | `GEMINI_MODEL` | yes | — |
//! | `MAILSORT_LLM_PROVIDER` | no | `gemini` |
//! | `OCR_SPACE_API_KEY` | in production | unset (OCR fallback disabled) |
//! | `ENVIRONMENT` | no | `development` |
//! | `MAILSORT_HOST` / `MAILSORT_PORT` | no | `0.0.0.0` / `8000` |

use crate::error::MailsortError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

const MB: u64 = 1024 * 1024;

/// Default OCR endpoint (OCR.space).
pub const DEFAULT_OCR_ENDPOINT: &str = "https://api.ocr.space/parse/image";

/// Configuration for ingestion, classification and request gatekeeping.
///
/// # Example
/// ```rust
/// use mailsort::MailsortConfig;
///
/// let config = MailsortConfig::builder()
///     .model("gemini-2.0-flash")
///     .ai_api_key("test-key")
///     .requests_per_5min(20)
///     .build()
///     .unwrap();
/// assert_eq!(config.requests_per_5min, 20);
/// ```
#[derive(Clone)]
pub struct MailsortConfig {
    /// edgequake-llm provider name. Default: `gemini`.
    pub provider_name: String,

    /// Model identifier passed to the provider, e.g. `gemini-2.0-flash`.
    pub model: String,

    /// API key for the generative-model provider.
    ///
    /// The provider itself reads its key from the environment; the copy kept
    /// here is used to validate startup and to redact error messages.
    pub ai_api_key: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the classification call. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 1024.
    pub max_tokens: usize,

    /// Timeout for the classification call in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// OCR API key. `None` disables the OCR fallback.
    pub ocr_api_key: Option<String>,

    /// OCR endpoint URL. Default: [`DEFAULT_OCR_ENDPOINT`].
    pub ocr_endpoint: String,

    /// OCR language code. Default: `por`.
    pub ocr_language: String,

    /// Timeout for the OCR call in seconds. Default: 60.
    pub ocr_timeout_secs: u64,

    /// Largest file the OCR service accepts. Default: 1 MB.
    pub ocr_max_file_bytes: u64,

    /// Largest file the ingestion pipeline reads. Default: 10 MB.
    pub max_file_bytes: u64,

    /// Largest upload the HTTP surface accepts. Default: 5 MB.
    pub max_upload_bytes: u64,

    /// Longest extracted text (in characters) sent to the model. Default: 1 000 000.
    pub max_content_chars: usize,

    /// Successful analyses allowed per client per rolling 5 minutes. Default: 10.
    pub requests_per_5min: usize,

    /// Successful analyses allowed per client per rolling 24 hours. Default: 100.
    pub requests_per_24h: usize,

    /// Deployment environment. Default: development.
    pub environment: Environment,

    /// Bind address for `mailsort serve`. Default: `0.0.0.0`.
    pub host: String,

    /// Bind port for `mailsort serve`. Default: 8000.
    pub port: u16,
}

impl Default for MailsortConfig {
    fn default() -> Self {
        Self {
            provider_name: "gemini".to_string(),
            model: "gemini-2.0-flash".to_string(),
            ai_api_key: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 1024,
            api_timeout_secs: 60,
            ocr_api_key: None,
            ocr_endpoint: DEFAULT_OCR_ENDPOINT.to_string(),
            ocr_language: "por".to_string(),
            ocr_timeout_secs: 60,
            ocr_max_file_bytes: MB,
            max_file_bytes: 10 * MB,
            max_upload_bytes: 5 * MB,
            max_content_chars: 1_000_000,
            requests_per_5min: 10,
            requests_per_24h: 100,
            environment: Environment::default(),
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl fmt::Debug for MailsortConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailsortConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("ai_api_key", &self.ai_api_key.as_ref().map(|_| "<set>"))
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("ocr_api_key", &self.ocr_api_key.as_ref().map(|_| "<set>"))
            .field("ocr_endpoint", &self.ocr_endpoint)
            .field("max_file_bytes", &self.max_file_bytes)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("requests_per_5min", &self.requests_per_5min)
            .field("requests_per_24h", &self.requests_per_24h)
            .field("environment", &self.environment)
            .finish()
    }
}

impl MailsortConfig {
    /// Create a new builder for `MailsortConfig`.
    pub fn builder() -> MailsortConfigBuilder {
        MailsortConfigBuilder {
            config: Self::default(),
        }
    }

    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, MailsortError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MailsortError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("GEMINI_API_KEY").ok_or_else(|| {
            MailsortError::InvalidConfig("GEMINI_API_KEY environment variable is required".into())
        })?;
        let model = get("GEMINI_MODEL").ok_or_else(|| {
            MailsortError::InvalidConfig("GEMINI_MODEL environment variable is required".into())
        })?;

        let mut builder = Self::builder().ai_api_key(api_key).model(model);

        if let Some(provider) = get("MAILSORT_LLM_PROVIDER") {
            builder = builder.provider_name(provider);
        }
        if let Some(key) = get("OCR_SPACE_API_KEY") {
            builder = builder.ocr_api_key(key);
        }
        if let Some(env) = get("ENVIRONMENT") {
            builder = builder.environment(env.parse()?);
        }
        if let Some(host) = get("MAILSORT_HOST") {
            builder = builder.host(host);
        }
        if let Some(port) = get("MAILSORT_PORT") {
            let port = port.parse::<u16>().map_err(|e| {
                MailsortError::InvalidConfig(format!("MAILSORT_PORT '{port}' is not a port: {e}"))
            })?;
            builder = builder.port(port);
        }

        builder.build()
    }

    /// Whether the OCR fallback can be used.
    pub fn ocr_enabled(&self) -> bool {
        self.ocr_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Builder for [`MailsortConfig`].
#[derive(Debug)]
pub struct MailsortConfigBuilder {
    config: MailsortConfig,
}

impl MailsortConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn ai_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.ai_api_key = Some(key.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn ocr_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.ocr_api_key = Some(key.into());
        self
    }

    pub fn ocr_endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.ocr_endpoint = url.into();
        self
    }

    pub fn ocr_language(mut self, lang: impl Into<String>) -> Self {
        self.config.ocr_language = lang.into();
        self
    }

    pub fn ocr_timeout_secs(mut self, secs: u64) -> Self {
        self.config.ocr_timeout_secs = secs;
        self
    }

    pub fn ocr_max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.ocr_max_file_bytes = bytes;
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_bytes = bytes;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: u64) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn max_content_chars(mut self, n: usize) -> Self {
        self.config.max_content_chars = n;
        self
    }

    pub fn requests_per_5min(mut self, n: usize) -> Self {
        self.config.requests_per_5min = n;
        self
    }

    pub fn requests_per_24h(mut self, n: usize) -> Self {
        self.config.requests_per_24h = n;
        self
    }

    pub fn environment(mut self, env: Environment) -> Self {
        self.config.environment = env;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<MailsortConfig, MailsortError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(MailsortError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_file_bytes == 0 || c.max_upload_bytes == 0 || c.ocr_max_file_bytes == 0 {
            return Err(MailsortError::InvalidConfig(
                "file size limits must be > 0".into(),
            ));
        }
        if c.requests_per_5min == 0 || c.requests_per_24h == 0 {
            return Err(MailsortError::InvalidConfig(
                "rate limits must be ≥ 1".into(),
            ));
        }
        if c.ocr_timeout_secs == 0 || c.api_timeout_secs == 0 {
            return Err(MailsortError::InvalidConfig("timeouts must be > 0".into()));
        }
        if c.environment == Environment::Production && !c.ocr_enabled() {
            return Err(MailsortError::InvalidConfig(
                "OCR_SPACE_API_KEY is required in production".into(),
            ));
        }
        Ok(self.config)
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = MailsortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(MailsortError::InvalidConfig(format!(
                "ENVIRONMENT must be 'development' or 'production', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => f.write_str("development"),
            Environment::Production => f.write_str("production"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_service_limits() {
        let c = MailsortConfig::default();
        assert_eq!(c.max_file_bytes, 10 * 1024 * 1024);
        assert_eq!(c.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(c.ocr_max_file_bytes, 1024 * 1024);
        assert_eq!(c.ocr_timeout_secs, 60);
        assert_eq!(c.max_content_chars, 1_000_000);
        assert_eq!(c.requests_per_5min, 10);
        assert_eq!(c.requests_per_24h, 100);
        assert_eq!(c.ocr_language, "por");
        assert!(!c.ocr_enabled());
    }

    #[test]
    fn from_lookup_requires_api_key_and_model() {
        let err = MailsortConfig::from_lookup(lookup(&[("GEMINI_MODEL", "m")])).unwrap_err();
        assert!(err.to_string().contains("GEMINI_API_KEY"));

        let err = MailsortConfig::from_lookup(lookup(&[("GEMINI_API_KEY", "k")])).unwrap_err();
        assert!(err.to_string().contains("GEMINI_MODEL"));
    }

    #[test]
    fn from_lookup_reads_optional_values() {
        let config = MailsortConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_MODEL", "gemini-2.5-flash"),
            ("OCR_SPACE_API_KEY", "ocr"),
            ("MAILSORT_PORT", "9000"),
        ]))
        .unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.ai_api_key.as_deref(), Some("k"));
        assert!(config.ocr_enabled());
        assert_eq!(config.port, 9000);
        assert_eq!(config.environment, Environment::Development);
    }

    #[test]
    fn missing_ocr_key_is_fine_outside_production() {
        let config = MailsortConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_MODEL", "m"),
            ("OCR_SPACE_API_KEY", "   "),
        ]))
        .unwrap();
        assert!(!config.ocr_enabled());
    }

    #[test]
    fn production_requires_ocr_key() {
        let err = MailsortConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_MODEL", "m"),
            ("ENVIRONMENT", "production"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("OCR_SPACE_API_KEY"));
    }

    #[test]
    fn invalid_port_rejected() {
        let err = MailsortConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("GEMINI_MODEL", "m"),
            ("MAILSORT_PORT", "eighty"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("MAILSORT_PORT"));
    }

    #[test]
    fn builder_rejects_zero_limits() {
        assert!(MailsortConfig::builder().requests_per_5min(0).build().is_err());
        assert!(MailsortConfig::builder().max_file_bytes(0).build().is_err());
    }

    #[test]
    fn debug_hides_secrets() {
        let config = MailsortConfig::builder()
            .ai_api_key("super-secret")
            .ocr_api_key("ocr-secret")
            .build()
            .unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("super-secret"));
        assert!(!dbg.contains("ocr-secret"));
    }

    #[test]
    fn environment_parse() {
        assert_eq!("PRODUCTION".parse::<Environment>().unwrap(), Environment::Production);
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Development);
        assert!("staging".parse::<Environment>().is_err());
    }
}
