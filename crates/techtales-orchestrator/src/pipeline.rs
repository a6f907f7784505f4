//! Pipeline state types for lesson generation.
//!
//! This module defines the per-request state machine the orchestrator walks
//! through, along with the history of transitions it records on the way.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TechTalesError};

// ============================================================================
// PipelineStatus
// ============================================================================

/// Current status of one lesson request.
///
/// The status transitions through these states:
/// - `Started` -> `StoryGenerated` -> `DiagramsSynthesized` -> `QuizGenerated` -> `Assembled`
/// - `DiagramsSynthesized` -> `Assembled` when the quiz degrades to empty
/// - any non-terminal state -> `Failed`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Request accepted; nothing generated yet.
    #[default]
    Started,
    /// Narrative and visual cues are available.
    StoryGenerated,
    /// One diagram exists per visual cue.
    DiagramsSynthesized,
    /// Quiz questions are available.
    QuizGenerated,
    /// The lesson has been assembled.
    Assembled,
    /// The request failed; no lesson is returned.
    Failed,
}

impl PipelineStatus {
    /// Returns `true` if this status represents a terminal state.
    ///
    /// Terminal states are: `Assembled`, `Failed`.
    ///
    /// # Examples
    ///
    /// ```
    /// use techtales_orchestrator::PipelineStatus;
    ///
    /// assert!(PipelineStatus::Assembled.is_terminal());
    /// assert!(PipelineStatus::Failed.is_terminal());
    /// assert!(!PipelineStatus::StoryGenerated.is_terminal());
    /// ```
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Assembled | Self::Failed)
    }

    /// Returns `true` if moving from `self` to `next` is allowed.
    #[must_use]
    pub const fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Started, Self::StoryGenerated)
                | (Self::StoryGenerated, Self::DiagramsSynthesized)
                | (Self::DiagramsSynthesized, Self::QuizGenerated | Self::Assembled)
                | (Self::QuizGenerated, Self::Assembled)
                | (
                    Self::Started
                        | Self::StoryGenerated
                        | Self::DiagramsSynthesized
                        | Self::QuizGenerated,
                    Self::Failed
                )
        )
    }
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Started => "started",
            Self::StoryGenerated => "story_generated",
            Self::DiagramsSynthesized => "diagrams_synthesized",
            Self::QuizGenerated => "quiz_generated",
            Self::Assembled => "assembled",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============================================================================
// TransitionRecord
// ============================================================================

/// Record of a single state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The state entered.
    pub status: PipelineStatus,

    /// Short note about the transition (counts, degrade reason, failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// When the state was entered.
    pub at: DateTime<Utc>,
}

// ============================================================================
// PipelineRun
// ============================================================================

/// State of one lesson request as it moves through the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Current status.
    pub status: PipelineStatus,

    /// Every state entered after `Started`, oldest first.
    pub history: Vec<TransitionRecord>,

    /// Why the run failed, once `status` is `Failed`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the state last changed.
    pub updated_at: DateTime<Utc>,
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRun {
    /// Creates a new run in the `Started` status.
    ///
    /// # Examples
    ///
    /// ```
    /// use techtales_orchestrator::{PipelineRun, PipelineStatus};
    ///
    /// let run = PipelineRun::new();
    /// assert_eq!(run.status, PipelineStatus::Started);
    /// assert!(run.history.is_empty());
    /// ```
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            status: PipelineStatus::Started,
            history: Vec::new(),
            failure: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` if the run is in a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if `next` does not follow the current status.
    pub fn advance(&mut self, next: PipelineStatus) -> Result<()> {
        self.advance_with(next, None::<String>)
    }

    /// Moves to `next`, recording a note with the transition.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if `next` does not follow the current status.
    pub fn advance_with(
        &mut self,
        next: PipelineStatus,
        detail: Option<impl Into<String>>,
    ) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(TechTalesError::invalid_transition(self.status, next));
        }
        let now = Utc::now();
        self.status = next;
        self.history.push(TransitionRecord {
            status: next,
            detail: detail.map(Into::into),
            at: now,
        });
        self.updated_at = now;
        Ok(())
    }

    /// Marks the run failed. Has no effect once the run is terminal.
    pub fn fail(&mut self, reason: impl Into<String>) {
        if self.is_terminal() {
            return;
        }
        let reason = reason.into();
        let now = Utc::now();
        self.status = PipelineStatus::Failed;
        self.history.push(TransitionRecord {
            status: PipelineStatus::Failed,
            detail: Some(reason.clone()),
            at: now,
        });
        self.failure = Some(reason);
        self.updated_at = now;
    }

    /// Returns `true` if `status` was entered at some point.
    #[must_use]
    pub fn reached(&self, status: PipelineStatus) -> bool {
        status == PipelineStatus::Started || self.history.iter().any(|r| r.status == status)
    }

    /// Returns the duration since the run started.
    #[must_use]
    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

// ============================================================================
// Tests
// ============================================================================
