//! Configuration types for the TechTales lesson orchestrator.
//!
//! This module provides all configuration structures used to control
//! lesson generation, including language-model backend selection, the
//! product limits on cues and quiz size, diagram canvas size, and storage.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TechTalesError};

/// The default config file name.
const CONFIG_FILE_NAME: &str = "techtales.json";

/// Upper bound accepted for `lesson.maxVisualCues`.
const VISUAL_CUE_CEILING: usize = 16;

/// Smallest diagram canvas the renderers can lay out.
const MIN_DIAGRAM_WIDTH: u32 = 128;
const MIN_DIAGRAM_HEIGHT: u32 = 96;

/// Most quiz attempts allowed: one initial call plus one retry.
pub const MAX_QUIZ_ATTEMPTS: u32 = 2;

fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

/// Default per-call timeout for the language model, in seconds.
const fn default_request_timeout() -> u32 {
    60
}

const fn default_max_visual_cues() -> usize {
    5
}

const fn default_quiz_question_count() -> usize {
    5
}

const fn default_quiz_max_attempts() -> u32 {
    MAX_QUIZ_ATTEMPTS
}

/// Story characters embedded in the quiz prompt before the excerpt is cut.
const fn default_story_excerpt_chars() -> usize {
    6000
}

const fn default_max_topic_chars() -> usize {
    200
}

const fn default_diagram_width() -> u32 {
    512
}

const fn default_diagram_height() -> u32 {
    384
}

fn default_storage_dir() -> String {
    ".techtales/lessons".to_string()
}

/// Main configuration for TechTales.
///
/// Controls the language-model backend, generation limits, diagram rendering,
/// and where finished lessons are stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Language-model backend used by the story and quiz stages.
    #[serde(default)]
    pub llm_provider: LlmProvider,

    /// Model name passed to the backend.
    #[serde(default = "default_model")]
    pub model: String,

    /// Override for the backend's base URL (provider default when unset).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout applied to every language-model call, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u32,

    /// Product limits for generated lessons.
    #[serde(default)]
    pub lesson: LessonLimits,

    /// Diagram canvas settings.
    #[serde(default)]
    pub diagram: DiagramConfig,

    /// Lesson persistence settings.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_provider: LlmProvider::default(),
            model: default_model(),
            api_base_url: None,
            api_key_env: default_api_key_env(),
            request_timeout_seconds: default_request_timeout(),
            lesson: LessonLimits::default(),
            diagram: DiagramConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the current working directory.
    ///
    /// Looks for `techtales.json` in the current directory. If found, loads and
    /// validates the configuration. If not found, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but contains invalid JSON.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            TechTalesError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `techtales.json` in a specific directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        Self::load_from_file(&config_path)
    }

    /// Loads configuration from a specific file path.
    ///
    /// If the file does not exist, returns default configuration.
    ///
    /// # Errors
    ///
    /// Returns `TechTalesError::ConfigParseError` if the file exists but contains
    /// invalid JSON or invalid enum values.
    ///
    /// Returns `TechTalesError::ConfigValidationError` if the configuration values
    /// are invalid (e.g., zero timeout, empty model name).
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(TechTalesError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| TechTalesError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `TechTalesError::ConfigValidationError` if any validation check fails.
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(TechTalesError::config_validation(
                "model must not be empty",
                "Set model to a model name such as \"gemini-2.0-flash\" in your techtales.json",
            ));
        }

        if self.api_key_env.trim().is_empty() {
            return Err(TechTalesError::config_validation(
                "apiKeyEnv must not be empty",
                "Set apiKeyEnv to the environment variable holding your API key",
            ));
        }

        if self.request_timeout_seconds == 0 {
            return Err(TechTalesError::config_validation(
                "requestTimeoutSeconds must be greater than 0",
                "Set requestTimeoutSeconds to at least 1 second in your techtales.json",
            ));
        }

        self.lesson.validate()?;

        if self.diagram.width < MIN_DIAGRAM_WIDTH || self.diagram.height < MIN_DIAGRAM_HEIGHT {
            return Err(TechTalesError::config_validation(
                format!(
                    "diagram canvas {}x{} is too small",
                    self.diagram.width, self.diagram.height
                ),
                format!(
                    "Set diagram.width >= {MIN_DIAGRAM_WIDTH} and diagram.height >= {MIN_DIAGRAM_HEIGHT}"
                ),
            ));
        }

        if self.storage.backend == StorageBackend::File && self.storage.dir.trim().is_empty() {
            return Err(TechTalesError::config_validation(
                "storage.dir must not be empty",
                "Provide a lesson directory in your techtales.json or use the memory backend",
            ));
        }

        Ok(())
    }

    /// Returns the language-model timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.request_timeout_seconds))
    }
}

/// Supported language-model backends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LlmProvider {
    /// Google Gemini (default).
    #[default]
    Gemini,
    /// Any `OpenAI`-compatible chat completions endpoint.
    OpenAi,
}

impl LlmProvider {
    /// Parses a string into an `LlmProvider`, case-insensitively.
    fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    /// Returns the base URL used when `apiBaseUrl` is not configured.
    #[must_use]
    pub const fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

impl<'de> Deserialize<'de> for LlmProvider {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str_case_insensitive(&s).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid LLM provider '{s}': expected one of 'gemini', 'openai'"
            ))
        })
    }
}

impl Serialize for LlmProvider {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Product limits applied to every generated lesson.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonLimits {
    /// Maximum visual cues kept from the story stage (extras are truncated).
    #[serde(default = "default_max_visual_cues")]
    pub max_visual_cues: usize,

    /// Number of quiz questions requested and kept.
    #[serde(default = "default_quiz_question_count")]
    pub quiz_question_count: usize,

    /// Total quiz model calls allowed, at most [`MAX_QUIZ_ATTEMPTS`].
    #[serde(default = "default_quiz_max_attempts")]
    pub quiz_max_attempts: u32,

    /// Story characters embedded in the quiz prompt.
    #[serde(default = "default_story_excerpt_chars")]
    pub story_excerpt_chars: usize,

    /// Longest topic accepted from a request.
    #[serde(default = "default_max_topic_chars")]
    pub max_topic_chars: usize,
}

impl Default for LessonLimits {
    fn default() -> Self {
        Self {
            max_visual_cues: default_max_visual_cues(),
            quiz_question_count: default_quiz_question_count(),
            quiz_max_attempts: default_quiz_max_attempts(),
            story_excerpt_chars: default_story_excerpt_chars(),
            max_topic_chars: default_max_topic_chars(),
        }
    }
}

impl LessonLimits {
    fn validate(&self) -> Result<()> {
        if self.max_visual_cues > VISUAL_CUE_CEILING {
            return Err(TechTalesError::config_validation(
                format!("lesson.maxVisualCues must be at most {VISUAL_CUE_CEILING}"),
                "Lower lesson.maxVisualCues in your techtales.json",
            ));
        }

        if self.quiz_question_count == 0 {
            return Err(TechTalesError::config_validation(
                "lesson.quizQuestionCount must be greater than 0",
                "Set lesson.quizQuestionCount to at least 1 in your techtales.json",
            ));
        }

        if self.quiz_max_attempts == 0 {
            return Err(TechTalesError::config_validation(
                "lesson.quizMaxAttempts must be greater than 0",
                "Set lesson.quizMaxAttempts to at least 1 in your techtales.json",
            ));
        }

        if self.quiz_max_attempts > MAX_QUIZ_ATTEMPTS {
            return Err(TechTalesError::config_validation(
                format!("lesson.quizMaxAttempts must be at most {MAX_QUIZ_ATTEMPTS}"),
                "Set lesson.quizMaxAttempts to 1 or 2 in your techtales.json",
            ));
        }

        if self.story_excerpt_chars == 0 {
            return Err(TechTalesError::config_validation(
                "lesson.storyExcerptChars must be greater than 0",
                "Set lesson.storyExcerptChars to a positive character count",
            ));
        }

        if self.max_topic_chars == 0 {
            return Err(TechTalesError::config_validation(
                "lesson.maxTopicChars must be greater than 0",
                "Set lesson.maxTopicChars to a positive character count",
            ));
        }

        Ok(())
    }
}

/// Diagram canvas settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramConfig {
    /// Canvas width in pixels.
    #[serde(default = "default_diagram_width")]
    pub width: u32,

    /// Canvas height in pixels.
    #[serde(default = "default_diagram_height")]
    pub height: u32,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self {
            width: default_diagram_width(),
            height: default_diagram_height(),
        }
    }
}

/// Where finished lessons are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per lesson in `storage.dir` (default).
    #[default]
    File,
    /// Process memory; lessons vanish on exit.
    Memory,
}

/// Lesson persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    /// Which store implementation to use.
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the file backend.
    #[serde(default = "default_storage_dir")]
    pub dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            dir: default_storage_dir(),
        }
    }
}
