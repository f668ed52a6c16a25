//! Classification: send cleaned text to the model and parse its verdict.
//!
//! The model is asked for a single JSON object (see [`crate::prompts`]) but in
//! practice wraps it in markdown fences or surrounds it with prose. Parsing
//! therefore scans for the first *complete* JSON object instead of trusting
//! the whole response, then validates fields one by one so that the error
//! names exactly what was wrong.
//!
//! There is no retry: one model call per classification. Quota errors from the
//! provider surface immediately as [`MailsortError::ClassificationFailed`].

use crate::config::MailsortConfig;
use crate::error::{redact, MailsortError};
use crate::output::ClassificationResult;
use crate::prompts::classification_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Produces a raw completion for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, MailsortError>;
}

/// [`TextGenerator`] backed by an edgequake-llm provider.
pub struct ProviderGenerator {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    timeout: Duration,
    api_key: String,
}

impl ProviderGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &MailsortConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            timeout: Duration::from_secs(config.api_timeout_secs),
            api_key: config.ai_api_key.clone().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl TextGenerator for ProviderGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, MailsortError> {
        let messages = vec![ChatMessage::user(prompt)];
        let start = Instant::now();

        let response = tokio::time::timeout(
            self.timeout,
            self.provider.chat(&messages, Some(&self.options)),
        )
        .await
        .map_err(|_| {
            MailsortError::ClassificationFailed(format!(
                "model call timed out after {}s",
                self.timeout.as_secs()
            ))
        })?
        .map_err(|e| MailsortError::ClassificationFailed(redact(&e.to_string(), &self.api_key)))?;

        debug!(
            "Model answered: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );
        Ok(response.content)
    }
}

/// Build `CompletionOptions` from the configuration.
fn build_options(config: &MailsortConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

/// Classifies documents through a [`TextGenerator`].
pub struct Classifier {
    generator: Arc<dyn TextGenerator>,
}

impl Classifier {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Classify `content`.
    ///
    /// Blank content fails with [`MailsortError::EmptyContent`] before any
    /// model call is made.
    pub async fn classify(&self, content: &str) -> Result<ClassificationResult, MailsortError> {
        if content.trim().is_empty() {
            return Err(MailsortError::EmptyContent);
        }

        let prompt = classification_prompt(content);
        info!("Classifying {} chars of text", content.chars().count());

        let raw = self.generator.generate(&prompt).await.map_err(|e| match e {
            MailsortError::ClassificationFailed(msg) => MailsortError::ClassificationFailed(msg),
            other => MailsortError::ClassificationFailed(other.to_string()),
        })?;

        let result = parse_classification(&raw)?;
        info!(
            "Classified as '{}' (confidence {:.2})",
            result.category, result.confidence
        );
        Ok(result)
    }
}

/// Parse the model's raw text into a [`ClassificationResult`].
///
/// Confidence outside `[0, 1]` is clamped, not rejected.
pub fn parse_classification(raw: &str) -> Result<ClassificationResult, MailsortError> {
    let object = first_json_object(raw)?;

    let category = required_string(&object, "category")?;
    let confidence = match object.get("confidence") {
        None => return Err(MailsortError::MissingField { field: "confidence" }),
        Some(v) => v.as_f64().ok_or(MailsortError::InvalidFieldType {
            field: "confidence",
            expected: "a number",
        })?,
    };
    let suggested_reply = required_string(&object, "suggested_reply")?;
    let reasoning = match object.get("reasoning") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };

    let clamped = confidence.clamp(0.0, 1.0);
    if clamped != confidence {
        warn!("Model confidence {} out of range; clamped to {}", confidence, clamped);
    }

    Ok(ClassificationResult {
        category,
        confidence: clamped,
        suggested_reply,
        reasoning,
    })
}

fn required_string(object: &Map<String, Value>, field: &'static str) -> Result<String, MailsortError> {
    match object.get(field) {
        None => Err(MailsortError::MissingField { field }),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(MailsortError::InvalidFieldType {
            field,
            expected: "a string",
        }),
    }
}

// ── JSON object scanner ──────────────────────────────────────────────────────

/// Return the first balanced `{...}` in `raw` that parses as a JSON object.
fn first_json_object(raw: &str) -> Result<Map<String, Value>, MailsortError> {
    let mut saw_balanced = false;

    for (start, _) in raw.match_indices('{') {
        let Some(end) = balanced_end(&raw[start..]) else {
            continue;
        };
        saw_balanced = true;
        let candidate = &raw[start..start + end];
        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(candidate) {
            return Ok(map);
        }
    }

    if saw_balanced {
        Err(MailsortError::MalformedResponse("invalid JSON".to_string()))
    } else {
        Err(MailsortError::MalformedResponse("no JSON object".to_string()))
    }
}

/// Byte length of the brace-balanced prefix of `s` (which starts with `{`),
/// ignoring braces inside string literals.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
