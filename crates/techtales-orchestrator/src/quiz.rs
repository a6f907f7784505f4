//! Quiz stage: multiple-choice questions grounded in the story.
//!
//! Each question is validated on its own and dropped if it breaks an
//! invariant. A short, unparseable, or transiently failed reply earns a retry
//! up to the configured attempt count; the attempt with the most valid
//! questions wins. Authentication and other permanent failures are not
//! retried.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::{LessonLimits, MAX_QUIZ_ATTEMPTS};
use crate::error::{Result, Stage, TechTalesError};
use crate::extract::{extract_as, locate, Shape};
use crate::lesson::{LessonRequest, QuizQuestion, QUIZ_OPTION_COUNT};
use crate::llm::{Prompt, TextAdapter};

/// Generates the lesson quiz.
#[derive(Debug, Clone)]
pub struct QuizStage {
    adapter: TextAdapter,
    question_count: usize,
    max_attempts: u32,
    excerpt_chars: usize,
    timeout: Duration,
}

impl QuizStage {
    /// Creates a quiz stage using the lesson limits for size and retries.
    ///
    /// The attempt count is capped at [`MAX_QUIZ_ATTEMPTS`].
    #[must_use]
    pub const fn new(adapter: TextAdapter, limits: &LessonLimits, timeout: Duration) -> Self {
        Self {
            adapter,
            question_count: limits.quiz_question_count,
            max_attempts: if limits.quiz_max_attempts > MAX_QUIZ_ATTEMPTS {
                MAX_QUIZ_ATTEMPTS
            } else {
                limits.quiz_max_attempts
            },
            excerpt_chars: limits.story_excerpt_chars,
            timeout,
        }
    }

    /// Number of questions requested and kept.
    #[must_use]
    pub const fn question_count(&self) -> usize {
        self.question_count
    }

    /// Builds the prompt for a story.
    #[must_use]
    pub fn prompt(&self, story: &str, request: &LessonRequest) -> Prompt {
        let k = self.question_count;
        let system = format!(
            "You are an expert educational quiz creator. Write exactly {k} multiple-choice \
             questions that test understanding of {topic} as explained in the story, for a \
             {age} audience at {difficulty} level. Cover different aspects of the concept.\n\n\
             Respond with a JSON array of {k} objects inside a ```json code block. Each object \
             has the fields \"question\", \"options\" (exactly {options} distinct strings), \
             \"correct_answer\" (copied exactly from options) and \"explanation\".",
            topic = request.topic,
            age = request.age_group,
            difficulty = request.difficulty,
            options = QUIZ_OPTION_COUNT,
        );
        let user = format!(
            "Create quiz questions about {} based on this story:\n\n{}",
            request.topic,
            story_excerpt(story, self.excerpt_chars)
        );
        Prompt::new(system, user)
    }

    /// Produces up to `question_count` valid questions.
    ///
    /// # Errors
    ///
    /// Returns `StageError(quiz)` only if every attempt failed at the model
    /// call itself. Unparseable replies yield an empty quiz instead.
    pub async fn generate(&self, story: &str, request: &LessonRequest) -> Result<Vec<QuizQuestion>> {
        let prompt = self.prompt(story, request);
        let k = self.question_count;
        let mut best: Vec<QuizQuestion> = Vec::new();
        let mut answered = false;
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            debug!(topic = %request.topic, attempt, "Requesting quiz");

            let raw = match self.adapter.complete(&prompt, self.timeout).await {
                Ok(raw) => raw,
                Err(e) => {
                    let transient = e.is_transient();
                    warn!(attempt, transient, error = %e, "Quiz model call failed");
                    last_error = Some(e);
                    if transient {
                        continue;
                    }
                    break;
                }
            };
            answered = true;

            match parse_quiz(&raw) {
                Ok(questions) => {
                    if questions.len() > best.len() {
                        best = questions;
                    }
                    if best.len() >= k {
                        break;
                    }
                    warn!(attempt, valid = best.len(), wanted = k, "Quiz came back short");
                }
                Err(e) => warn!(attempt, error = %e, "Quiz reply was unparseable"),
            }
        }

        if !answered {
            let message = last_error.map_or_else(
                || "no attempts were made".to_string(),
                |e| e.to_string(),
            );
            return Err(TechTalesError::stage(Stage::Quiz, message));
        }

        best.truncate(k);
        info!(topic = %request.topic, questions = best.len(), "Quiz generated");
        Ok(best)
    }
}

/// Recovers the valid questions from raw model text.
///
/// Accepts a bare array of question objects or an object with a
/// `questions` array. Items that fail validation are dropped.
///
/// # Errors
///
/// Returns `MalformedResponse` if neither form can be found.
pub fn parse_quiz(raw: &str) -> Result<Vec<QuizQuestion>> {
    let items = question_array(raw).map_or_else(|| questions_field(raw), Ok)?;

    let total = items.len();
    let questions: Vec<QuizQuestion> = items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value::<QuizQuestion>(item) {
            Ok(question) => Some(question),
            Err(e) => {
                warn!(index, error = %e, "Dropping invalid quiz question");
                None
            }
        })
        .collect();

    debug!(received = total, valid = questions.len(), "Validated quiz questions");
    Ok(questions)
}

/// First array in `raw` holding at least one object. Arrays of plain
/// strings (topic lists and the like) are skipped.
fn question_array(raw: &str) -> Option<Vec<Value>> {
    let mut rest = raw;
    while let Some(found) = locate(rest, Shape::Array) {
        if let Value::Array(items) = found.value {
            if items.iter().any(Value::is_object) {
                return Some(items);
            }
        }
        rest = &rest[found.range.end..];
    }
    None
}

#[derive(Deserialize)]
struct QuestionsWrapper {
    questions: Vec<Value>,
}

fn questions_field(raw: &str) -> Result<Vec<Value>> {
    extract_as::<QuestionsWrapper>(raw, Shape::Object).map(|wrapper| wrapper.questions)
}

/// Returns at most `max_chars` characters of the story, cut at a word
/// boundary when one is near.
#[must_use]
pub fn story_excerpt(story: &str, max_chars: usize) -> &str {
    let Some((cut, _)) = story.char_indices().nth(max_chars) else {
        return story;
    };
    let head = &story[..cut];
    match head.rfind(char::is_whitespace) {
        Some(space) if space >= cut / 2 => head[..space].trim_end(),
        _ => head,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::LlmErrorKind;
    use crate::lesson::{AgeGroup, Difficulty};
    use crate::llm::{Reply, ScriptedModel};

    fn request() -> LessonRequest {
        LessonRequest::new("OSI Layers", AgeGroup::Adult, Difficulty::Beginner, 200).unwrap()
    }

    fn question_json(n: usize, answer: &str) -> String {
        format!(
            r#"{{"question": "Question {n}?", "options": ["A{n}", "B{n}", "C{n}", "D{n}"], "correct_answer": "{answer}", "explanation": "Because {n}."}}"#
        )
    }

    fn quiz_array(count: usize) -> String {
        let items: Vec<String> = (1..=count).map(|n| question_json(n, &format!("A{n}"))).collect();
        format!("[{}]", items.join(", "))
    }

    fn stage_with(model: Arc<ScriptedModel>) -> QuizStage {
        QuizStage::new(
            TextAdapter::new(model),
            &LessonLimits::default(),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn test_parse_drops_invalid_question() {
        let mut items: Vec<String> = (1..=5).map(|n| question_json(n, &format!("B{n}"))).collect();
        items.insert(2, question_json(9, "Not an option"));
        let raw = format!("Here is your quiz:\n```json\n[{}]\n```", items.join(",\n"));

        let questions = parse_quiz(&raw).unwrap();
        assert_eq!(questions.len(), 5);
        for q in &questions {
            assert!(q.options().iter().any(|o| o == q.correct_answer()));
            assert_eq!(q.options().len(), 4);
        }
    }

    #[test]
    fn test_parse_object_form() {
        let raw = format!(r#"{{"questions": {}}}"#, quiz_array(3));
        assert_eq!(parse_quiz(&raw).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_drops_non_objects_and_bad_option_counts() {
        let raw = r#"[
            {"question": "Q?", "options": ["a", "b", "c"], "correct_answer": "a", "explanation": ""},
            "stray text",
            {"question": "Q2?", "options": ["a", "b", "c", "d"], "correct_answer": "d"}
        ]"#;
        let questions = parse_quiz(raw).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].question(), "Q2?");
        assert_eq!(questions[0].explanation(), "");
    }

    #[test]
    fn test_parse_skips_leading_string_array() {
        let raw = format!("Topics: [\"OSI\", \"TCP\"]\n{}", quiz_array(2));
        let questions = parse_quiz(&raw).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].question(), "Question 1?");
    }

    #[test]
    fn test_parse_skips_fenced_string_array() {
        let raw = format!(
            "```json\n[\"OSI\"]\n```\nAnd the quiz:\n```json\n{}\n```",
            quiz_array(3)
        );
        assert_eq!(parse_quiz(&raw).unwrap().len(), 3);
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        let err = parse_quiz("I could not think of any questions.").unwrap_err();
        assert!(matches!(err, TechTalesError::MalformedResponse { .. }));
    }

    #[test]
    fn test_story_excerpt() {
        assert_eq!(story_excerpt("short story", 100), "short story");
        assert_eq!(story_excerpt("alpha beta gamma", 12), "alpha beta");
        assert_eq!(story_excerpt("abcdefghij", 4), "abcd");
        // Multi-byte characters are never split.
        assert_eq!(story_excerpt("ééééé", 3), "ééé");
    }

    #[test]
    fn test_prompt_embeds_excerpt() {
        let limits = LessonLimits {
            story_excerpt_chars: 10,
            ..LessonLimits::default()
        };
        let stage = QuizStage::new(
            TextAdapter::new(Arc::new(ScriptedModel::new(vec![]))),
            &limits,
            Duration::from_secs(1),
        );
        let prompt = stage.prompt("one two three four five", &request());
        assert!(prompt.user.contains("one two"));
        assert!(!prompt.user.contains("five"));
        assert!(prompt.system.contains("exactly 5"));
    }

    #[tokio::test]
    async fn test_full_quiz_in_one_call() {
        let model = Arc::new(ScriptedModel::new(vec![Reply::text(quiz_array(5))]));
        let questions = stage_with(model.clone())
            .generate("story", &request())
            .await
            .unwrap();
        assert_eq!(questions.len(), 5);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_extra_questions_are_truncated() {
        let model = Arc::new(ScriptedModel::new(vec![Reply::text(quiz_array(7))]));
        let questions = stage_with(model).generate("story", &request()).await.unwrap();
        assert_eq!(questions.len(), 5);
    }

    #[tokio::test]
    async fn test_short_quiz_retries_once_and_keeps_best() {
        let model = Arc::new(ScriptedModel::new(vec![
            Reply::text(quiz_array(3)),
            Reply::text(quiz_array(2)),
        ]));
        let questions = stage_with(model.clone())
            .generate("story", &request())
            .await
            .unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_retry_after_adapter_error() {
        let model = Arc::new(ScriptedModel::new(vec![
            Reply::Fail(LlmErrorKind::Server),
            Reply::text(quiz_array(5)),
        ]));
        let questions = stage_with(model).generate("story", &request()).await.unwrap();
        assert_eq!(questions.len(), 5);
    }

    #[tokio::test]
    async fn test_every_call_failing_is_quiz_stage_error() {
        let model = Arc::new(ScriptedModel::new(vec![Reply::Fail(LlmErrorKind::Network)]));
        let err = stage_with(model.clone())
            .generate("story", &request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TechTalesError::StageError {
                stage: Stage::Quiz,
                ..
            }
        ));
        assert!(!err.is_user_visible());
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_attempts_are_capped_at_one_retry() {
        let limits = LessonLimits {
            quiz_max_attempts: 6,
            ..LessonLimits::default()
        };
        let model = Arc::new(ScriptedModel::new(vec![Reply::Fail(LlmErrorKind::Server)]));
        let stage = QuizStage::new(TextAdapter::new(model.clone()), &limits, Duration::from_secs(1));

        assert!(stage.generate("story", &request()).await.is_err());
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let model = Arc::new(ScriptedModel::new(vec![Reply::Fail(
            LlmErrorKind::Authentication,
        )]));
        let err = stage_with(model.clone())
            .generate("story", &request())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TechTalesError::StageError {
                stage: Stage::Quiz,
                ..
            }
        ));
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_unparseable_replies_yield_empty_quiz() {
        let model = Arc::new(ScriptedModel::new(vec![Reply::text("no json, sorry")]));
        let questions = stage_with(model).generate("story", &request()).await.unwrap();
        assert!(questions.is_empty());
    }
}
