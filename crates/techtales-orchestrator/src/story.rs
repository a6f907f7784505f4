//! Story stage: narrative text plus the visual cues worth illustrating.
//!
//! The model is asked for prose followed by a JSON array of cue phrases.
//! Responses in the object form `{"story": ..., "visual_cues": [...]}` are
//! accepted as well. A missing or malformed cue list degrades to no cues;
//! only a failed call or an empty narrative fails the stage.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Result, Stage, TechTalesError};
use crate::extract::{locate, Shape};
use crate::lesson::LessonRequest;
use crate::llm::{Prompt, TextAdapter};

/// Narrative and cues produced by the story stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryOutput {
    /// The explanatory narrative, never empty.
    pub story: String,
    /// Phrases describing what to illustrate, at most the configured maximum.
    pub visual_cues: Vec<String>,
}

/// Generates the lesson narrative.
#[derive(Debug, Clone)]
pub struct StoryStage {
    adapter: TextAdapter,
    max_visual_cues: usize,
    timeout: Duration,
}

impl StoryStage {
    /// Creates a story stage.
    #[must_use]
    pub const fn new(adapter: TextAdapter, max_visual_cues: usize, timeout: Duration) -> Self {
        Self {
            adapter,
            max_visual_cues,
            timeout,
        }
    }

    /// Builds the prompt for a request.
    #[must_use]
    pub fn prompt(&self, request: &LessonRequest) -> Prompt {
        let system = format!(
            "You are an expert educational storyteller. You explain technical computer \
             science concepts through engaging, analogy-rich stories.\n\n\
             Write a story that explains {topic} for a {age} audience at {difficulty} level. \
             Use real-world analogies, break the concept into digestible parts, and keep it \
             educational but entertaining.\n\n\
             After the story, list up to {max} specific visual cues worth illustrating, as a \
             JSON array of strings inside a ```json code block. Each cue should name the \
             structure it shows (for example layers, storage, or a network of nodes).",
            topic = request.topic,
            age = request.age_group,
            difficulty = request.difficulty,
            max = self.max_visual_cues,
        );
        let user = format!(
            "Create an educational story about {} for a {} audience at {} level. \
             Include specific visual cues for illustrations.",
            request.topic, request.age_group, request.difficulty
        );
        Prompt::new(system, user)
    }

    /// Calls the model once and splits its reply into narrative and cues.
    ///
    /// # Errors
    ///
    /// Returns `StageError(story)` if the model call fails or times out, or if
    /// the reply contains no narrative text.
    pub async fn generate(&self, request: &LessonRequest) -> Result<StoryOutput> {
        info!(topic = %request.topic, "Generating story");

        let raw = self
            .adapter
            .complete(&self.prompt(request), self.timeout)
            .await
            .map_err(|e| TechTalesError::stage(Stage::Story, e.to_string()))?;

        let output = parse_story(&raw, self.max_visual_cues)?;
        info!(
            topic = %request.topic,
            story_chars = output.story.len(),
            visual_cues = output.visual_cues.len(),
            "Story generated"
        );
        Ok(output)
    }
}

/// Splits raw model text into narrative and visual cues.
///
/// # Errors
///
/// Returns `StageError(story)` if no narrative text remains.
pub fn parse_story(raw: &str, max_visual_cues: usize) -> Result<StoryOutput> {
    if let Some(output) = parse_object_form(raw, max_visual_cues) {
        return Ok(output);
    }

    let (story, visual_cues) = match locate(raw, Shape::Array) {
        Some(found) => {
            let mut narrative = String::with_capacity(raw.len());
            narrative.push_str(&raw[..found.range.start]);
            narrative.push_str(&raw[found.range.end..]);
            (
                tidy_narrative(&narrative),
                collect_cues(&found.value, max_visual_cues),
            )
        }
        None => {
            warn!("No visual cue list in story response; continuing without cues");
            (tidy_narrative(raw), Vec::new())
        }
    };

    if story.is_empty() {
        return Err(TechTalesError::stage(
            Stage::Story,
            "model returned no narrative text",
        ));
    }

    Ok(StoryOutput { story, visual_cues })
}

/// Accepts `{"story": "...", "visual_cues": [...]}` when the object carries a story.
fn parse_object_form(raw: &str, max_visual_cues: usize) -> Option<StoryOutput> {
    let found = locate(raw, Shape::Object)?;
    let story = found.value.get("story")?.as_str()?.trim().to_string();
    if story.is_empty() {
        return None;
    }

    let visual_cues = match found.value.get("visual_cues") {
        Some(cues) => collect_cues(cues, max_visual_cues),
        None => {
            warn!("Story object has no visual_cues field; continuing without cues");
            Vec::new()
        }
    };

    debug!("Story response used the object form");
    Some(StoryOutput { story, visual_cues })
}

/// Keeps non-blank string entries, in order, up to `max`.
fn collect_cues(value: &Value, max: usize) -> Vec<String> {
    let Some(items) = value.as_array() else {
        warn!("visual_cues is not an array; continuing without cues");
        return Vec::new();
    };

    let cues: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|cue| !cue.is_empty())
        .map(str::to_string)
        .collect();

    let skipped = items.len() - cues.len();
    if skipped > 0 {
        warn!(skipped, "Dropped blank or non-text visual cues");
    }
    if cues.len() > max {
        debug!(received = cues.len(), max, "Truncating visual cues");
    }

    cues.into_iter().take(max).collect()
}

/// Trims the narrative and drops a dangling cue heading left by the removed list.
fn tidy_narrative(text: &str) -> String {
    let mut lines: Vec<&str> = text.trim().lines().collect();
    while let Some(last) = lines.last() {
        let line = last.trim();
        let heading = line.trim_matches(|c: char| c == '*' || c == '#' || c == ':' || c.is_whitespace());
        if line.is_empty() || heading.eq_ignore_ascii_case("visual cues") {
            lines.pop();
        } else {
            break;
        }
    }
    lines.join("\n").trim().to_string()
}
