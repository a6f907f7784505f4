//! Error types for the TechTales lesson orchestrator.
//!
//! This module defines the error hierarchy for all orchestrator operations,
//! including configuration loading, request validation, language-model calls,
//! stage failures, and lesson persistence.

use std::path::PathBuf;

/// A specialized `Result` type for TechTales orchestrator operations.
pub type Result<T> = std::result::Result<T, TechTalesError>;

/// The generation stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Narrative and visual-cue generation.
    Story,
    /// Multiple-choice quiz generation.
    Quiz,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Story => write!(f, "story"),
            Self::Quiz => write!(f, "quiz"),
        }
    }
}

/// Errors that can occur while generating, storing, or serving lessons.
///
/// Error variants are organized by subsystem and include actionable suggestions
/// where possible to help users resolve issues.
#[derive(Debug, thiserror::Error)]
pub enum TechTalesError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your techtales.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Request Errors
    // ========================================================================
    /// The lesson request was malformed (empty topic, unknown age group, ...).
    #[error("Invalid {field}: {message}")]
    InvalidInput {
        /// The offending request field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    // ========================================================================
    // Language-Model Errors
    // ========================================================================
    /// The language-model backend could not be reached or rejected the call.
    #[error("Language model unavailable ({kind}): {message}\n\nSuggestion: {suggestion}")]
    AdapterUnavailable {
        /// The kind of failure (authentication, rate limit, ...).
        kind: LlmErrorKind,
        /// Detailed error message from the backend.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    /// The language-model call did not finish within the caller-supplied timeout.
    #[error("Language model timed out after {timeout_secs}s")]
    AdapterTimeout {
        /// The timeout that elapsed, in seconds.
        timeout_secs: u64,
    },

    /// The model's text did not contain a parseable structured value.
    #[error("Malformed model response: {message}")]
    MalformedResponse {
        /// Why extraction or parsing failed.
        message: String,
    },

    // ========================================================================
    // Stage Errors
    // ========================================================================
    /// A generation stage could not produce its output.
    #[error("{stage} generation failed: {message}")]
    StageError {
        /// The stage that failed.
        stage: Stage,
        /// Description of the underlying failure.
        message: String,
    },

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// No lesson exists with the requested id.
    #[error("Lesson not found: '{id}'")]
    LessonNotFound {
        /// The id that was looked up.
        id: String,
    },

    /// The lesson store failed to read or write.
    #[error("Lesson storage error at '{path}': {message}\n\nSuggestion: Check that the storage directory exists and is writable")]
    StorageError {
        /// The file or directory involved.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    // ========================================================================
    // General I/O Errors
    // ========================================================================
    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // State Machine Errors
    // ========================================================================
    /// Invalid pipeline state transition attempted.
    #[error("Invalid state transition: cannot go from {from} to {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },
}

/// Categories of language-model failures for structured error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Authentication failure (invalid API key, expired credentials).
    Authentication,
    /// Rate limit exceeded.
    RateLimit,
    /// Server error (5xx responses).
    Server,
    /// Network connectivity issues.
    Network,
    /// Other unclassified errors.
    Other,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "authentication"),
            Self::RateLimit => write!(f, "rate_limit"),
            Self::Server => write!(f, "server"),
            Self::Network => write!(f, "network"),
            Self::Other => write!(f, "other"),
        }
    }
}

impl LlmErrorKind {
    /// Returns a suggestion message for this error kind.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::Authentication => "Check your API key (see 'apiKeyEnv' in techtales.json)",
            Self::RateLimit => "Wait and retry, or reduce request frequency",
            Self::Server => "Retry later; the model service may be experiencing issues",
            Self::Network => "Check your network connection and 'apiBaseUrl'",
            Self::Other => "Check the model provider's status page",
        }
    }

    /// Classifies an HTTP status code returned by a model backend.
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Authentication,
            429 => Self::RateLimit,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

impl TechTalesError {
    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `InvalidInput` error for a request field.
    #[must_use]
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a new `AdapterUnavailable` error with automatic suggestion based on kind.
    #[must_use]
    pub fn adapter_unavailable(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        let suggestion = kind.suggestion().to_string();
        Self::AdapterUnavailable {
            kind,
            message: message.into(),
            suggestion,
        }
    }

    /// Creates a new `AdapterTimeout` error.
    #[must_use]
    pub const fn adapter_timeout(timeout_secs: u64) -> Self {
        Self::AdapterTimeout { timeout_secs }
    }

    /// Creates a new `MalformedResponse` error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Creates a new `StageError` for the given stage.
    #[must_use]
    pub fn stage(stage: Stage, message: impl Into<String>) -> Self {
        Self::StageError {
            stage,
            message: message.into(),
        }
    }

    /// Creates a new `LessonNotFound` error.
    #[must_use]
    pub fn lesson_not_found(id: impl Into<String>) -> Self {
        Self::LessonNotFound { id: id.into() }
    }

    /// Creates a new `StorageError`.
    #[must_use]
    pub fn storage(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StorageError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `InvalidStateTransition` error.
    #[must_use]
    pub fn invalid_transition(from: impl std::fmt::Display, to: impl std::fmt::Display) -> Self {
        Self::InvalidStateTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Returns `true` if this error is transient and the call may be retried.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::AdapterUnavailable {
                kind: LlmErrorKind::RateLimit | LlmErrorKind::Server | LlmErrorKind::Network,
                ..
            } | Self::AdapterTimeout { .. }
        )
    }

    /// Returns `true` if this error surfaces to the requester as a failed lesson.
    ///
    /// Only bad requests and story failures do; everything else is absorbed
    /// into a degraded lesson.
    #[must_use]
    pub const fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::StageError {
                    stage: Stage::Story,
                    ..
                }
        )
    }
}
