//! Language-model capability and the text-generation adapter.
//!
//! [`LanguageModel`] is the external capability: it turns a [`Prompt`] into
//! unstructured text. [`TextAdapter`] is the only thing the stages talk to;
//! it bounds every call with a caller-supplied timeout and logs the call.
//!
//! Two HTTP backends are provided: Google Gemini (`generateContent`) and any
//! `OpenAI`-compatible `chat/completions` endpoint.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::config::{Config, LlmProvider};
use crate::error::{LlmErrorKind, Result, TechTalesError};

/// Longest backend error body kept in an error message.
const MAX_ERROR_BODY_CHARS: usize = 300;

/// A system instruction plus the user message for one model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Instructions describing the model's role and output format.
    pub system: String,
    /// The request itself.
    pub user: String,
}

impl Prompt {
    /// Creates a new prompt.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Total characters sent to the model.
    #[must_use]
    pub fn len(&self) -> usize {
        self.system.len() + self.user.len()
    }

    /// Returns `true` if both parts are empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.system.is_empty() && self.user.is_empty()
    }
}

/// An external text-generation capability.
///
/// Implementations return whatever text the model produced, formatting noise
/// included; callers are responsible for recovering structure.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Sends the prompt and returns the raw completion text.
    async fn complete(&self, prompt: &Prompt) -> Result<String>;
}

/// Timeout-bounded access to a [`LanguageModel`].
#[derive(Clone)]
pub struct TextAdapter {
    model: Arc<dyn LanguageModel>,
}

impl std::fmt::Debug for TextAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextAdapter")
            .field("model", &self.model_name())
            .finish()
    }
}

impl TextAdapter {
    /// Wraps a language model.
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Name of the wrapped model.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Completes the prompt, failing with `AdapterTimeout` if it takes longer
    /// than `timeout`.
    ///
    /// Dropping the returned future abandons the in-flight call.
    pub async fn complete(&self, prompt: &Prompt, timeout: Duration) -> Result<String> {
        let started = Instant::now();
        debug!(
            model = self.model_name(),
            prompt_chars = prompt.len(),
            timeout_ms = timeout.as_millis(),
            "Calling language model"
        );

        let outcome = tokio::time::timeout(timeout, self.model.complete(prompt)).await;
        let elapsed_ms = started.elapsed().as_millis();

        match outcome {
            Ok(Ok(text)) => {
                debug!(
                    model = self.model_name(),
                    elapsed_ms,
                    response_chars = text.len(),
                    "Language model responded"
                );
                Ok(text)
            }
            Ok(Err(e)) => {
                warn!(model = self.model_name(), elapsed_ms, error = %e, "Language model call failed");
                Err(e)
            }
            Err(_) => {
                warn!(model = self.model_name(), elapsed_ms, "Language model call timed out");
                Err(TechTalesError::adapter_timeout(timeout.as_secs()))
            }
        }
    }
}

/// Builds the configured HTTP backend.
///
/// # Errors
///
/// Returns `ConfigValidationError` if the API key environment variable is
/// unset, or `AdapterUnavailable` if the HTTP client cannot be built.
pub fn model_from_config(config: &Config) -> Result<Arc<dyn LanguageModel>> {
    let api_key = std::env::var(&config.api_key_env).map_err(|_| {
        TechTalesError::config_validation(
            format!("environment variable {} is not set", config.api_key_env),
            format!(
                "Export {} with your {} API key, or change apiKeyEnv in techtales.json",
                config.api_key_env, config.llm_provider
            ),
        )
    })?;

    let base_url = config
        .api_base_url
        .clone()
        .unwrap_or_else(|| config.llm_provider.default_base_url().to_string());

    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .map_err(|e| TechTalesError::adapter_unavailable(LlmErrorKind::Other, e.to_string()))?;

    let model: Arc<dyn LanguageModel> = match config.llm_provider {
        LlmProvider::Gemini => Arc::new(GeminiModel::new(
            client,
            base_url,
            config.model.clone(),
            api_key,
        )),
        LlmProvider::OpenAi => Arc::new(OpenAiModel::new(
            client,
            base_url,
            config.model.clone(),
            api_key,
        )),
    };
    Ok(model)
}

// ============================================================================
// Gemini
// ============================================================================

/// Google Gemini `generateContent` backend.
pub struct GeminiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiModel {
    /// Creates a backend for the given model and key on a shared client.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

fn gemini_body(prompt: &Prompt) -> Value {
    json!({
        "systemInstruction": { "parts": [{ "text": prompt.system }] },
        "contents": [{ "role": "user", "parts": [{ "text": prompt.user }] }],
    })
}

fn gemini_text(response: GeminiResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| content.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(TechTalesError::adapter_unavailable(
            LlmErrorKind::Other,
            "Gemini returned no candidate text",
        ));
    }
    Ok(text)
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        );
        let request = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&gemini_body(prompt));

        let response: GeminiResponse = send_json(request).await?;
        gemini_text(response)
    }
}

// ============================================================================
// OpenAI-compatible
// ============================================================================

/// `OpenAI`-compatible `chat/completions` backend.
pub struct OpenAiModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl OpenAiModel {
    /// Creates a backend for the given model and key on a shared client.
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn chat_body(model: &str, prompt: &Prompt) -> Value {
    json!({
        "model": model,
        "messages": [
            { "role": "system", "content": prompt.system },
            { "role": "user", "content": prompt.user },
        ],
    })
}

fn chat_text(response: ChatResponse) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| {
            TechTalesError::adapter_unavailable(LlmErrorKind::Other, "chat completion had no content")
        })
}

#[async_trait]
impl LanguageModel for OpenAiModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let request = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&chat_body(&self.model, prompt));

        let response: ChatResponse = send_json(request).await?;
        chat_text(response)
    }
}

// ============================================================================
// Scripted
// ============================================================================

/// One canned reply of a [`ScriptedModel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Return this text.
    Text(String),
    /// Fail with `AdapterUnavailable` of this kind.
    Fail(LlmErrorKind),
    /// Never answer; the adapter timeout decides.
    Hang,
}

impl Reply {
    /// Shorthand for [`Reply::Text`].
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }
}

/// Replays canned replies in order, repeating the last one once exhausted.
///
/// Used for offline runs and to drive the stages deterministically in tests.
#[derive(Debug)]
pub struct ScriptedModel {
    replies: Vec<Reply>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl ScriptedModel {
    /// Creates a model that answers with `replies` in order.
    #[must_use]
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Number of calls received so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Prompts received so far, oldest first.
    #[must_use]
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.clone());
        }

        let reply = self
            .replies
            .get(index)
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or(Reply::Fail(LlmErrorKind::Other));

        match reply {
            Reply::Text(text) => Ok(text),
            Reply::Fail(kind) => Err(TechTalesError::adapter_unavailable(
                kind,
                format!("scripted failure on call {}", index + 1),
            )),
            Reply::Hang => {
                futures::future::pending::<()>().await;
                Err(TechTalesError::adapter_unavailable(
                    LlmErrorKind::Other,
                    "scripted hang ended",
                ))
            }
        }
    }
}

// ============================================================================
// Shared HTTP handling
// ============================================================================

/// Sends a request and decodes a JSON body, classifying failures.
async fn send_json<T: serde::de::DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T> {
    let response = request
        .send()
        .await
        .map_err(|e| TechTalesError::adapter_unavailable(LlmErrorKind::Network, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        return Err(TechTalesError::adapter_unavailable(
            LlmErrorKind::from_status(status.as_u16()),
            format!("HTTP {status}: {snippet}"),
        ));
    }

    response
        .json::<T>()
        .await
        .map_err(|e| TechTalesError::adapter_unavailable(LlmErrorKind::Other, e.to_string()))
}
