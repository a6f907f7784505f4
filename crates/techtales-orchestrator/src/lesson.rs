//! Lesson data model.
//!
//! A [`Lesson`] is assembled once per request by the orchestrator and is a
//! plain value afterwards. Quiz questions validate their own invariants at
//! construction, and diagram images serialize as base64 text at the JSON
//! boundary.

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TechTalesError};

/// Number of options every quiz question carries.
pub const QUIZ_OPTION_COUNT: usize = 4;

// ============================================================================
// Request selectors
// ============================================================================

/// Audience the lesson is written for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgeGroup {
    /// Young learners.
    Child,
    /// Teenagers.
    Teen,
    /// Adults.
    Adult,
}

impl AgeGroup {
    /// All age groups in display order.
    pub const ALL: [Self; 3] = [Self::Child, Self::Teen, Self::Adult];

    /// Lowercase identifier used in prompts and JSON.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Teen => "teen",
            Self::Adult => "adult",
        }
    }
}

impl std::fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgeGroup {
    type Err = TechTalesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "child" => Ok(Self::Child),
            "teen" => Ok(Self::Teen),
            "adult" => Ok(Self::Adult),
            other => Err(TechTalesError::invalid_input(
                "age_group",
                format!("'{other}' is not one of 'child', 'teen', 'adult'"),
            )),
        }
    }
}

/// How deep the explanation goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    /// No prior knowledge assumed.
    Beginner,
    /// Some familiarity assumed.
    Intermediate,
    /// Detailed, technical treatment.
    Advanced,
}

impl Difficulty {
    /// All difficulties in display order.
    pub const ALL: [Self; 3] = [Self::Beginner, Self::Intermediate, Self::Advanced];

    /// Lowercase identifier used in prompts and JSON.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = TechTalesError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(TechTalesError::invalid_input(
                "difficulty",
                format!("'{other}' is not one of 'beginner', 'intermediate', 'advanced'"),
            )),
        }
    }
}

/// A validated request for one lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonRequest {
    /// Topic to explain, trimmed and non-empty.
    pub topic: String,
    /// Target audience.
    pub age_group: AgeGroup,
    /// Target depth.
    pub difficulty: Difficulty,
}

impl LessonRequest {
    /// Builds a request from already-typed selectors, validating the topic.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` if the topic is blank or longer than `max_topic_chars`.
    pub fn new(
        topic: &str,
        age_group: AgeGroup,
        difficulty: Difficulty,
        max_topic_chars: usize,
    ) -> Result<Self> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(TechTalesError::invalid_input("topic", "must not be empty"));
        }
        let length = topic.chars().count();
        if length > max_topic_chars {
            return Err(TechTalesError::invalid_input(
                "topic",
                format!("is {length} characters; the limit is {max_topic_chars}"),
            ));
        }
        Ok(Self {
            topic: topic.to_string(),
            age_group,
            difficulty,
        })
    }

    /// Builds a request from raw strings as they arrive at the boundary.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank topic or an unknown selector value.
    pub fn parse(
        topic: &str,
        age_group: &str,
        difficulty: &str,
        max_topic_chars: usize,
    ) -> Result<Self> {
        Self::new(
            topic,
            age_group.parse()?,
            difficulty.parse()?,
            max_topic_chars,
        )
    }
}

// ============================================================================
// QuizQuestion
// ============================================================================

/// Why a quiz question was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuizValidationError {
    /// The question text was blank.
    #[error("question text is empty")]
    EmptyQuestion,
    /// The question did not carry exactly four options.
    #[error("expected 4 options, found {0}")]
    WrongOptionCount(usize),
    /// Two options had the same text.
    #[error("duplicate option '{0}'")]
    DuplicateOption(String),
    /// An option was blank.
    #[error("option text is empty")]
    EmptyOption,
    /// The correct answer is not one of the options.
    #[error("correct answer '{0}' is not among the options")]
    AnswerNotInOptions(String),
}

/// A multiple-choice question whose answer is guaranteed to be one of its options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuizQuestion")]
pub struct QuizQuestion {
    question: String,
    options: Vec<String>,
    correct_answer: String,
    explanation: String,
}

/// Unchecked wire form of a quiz question.
#[derive(Debug, Clone, Deserialize)]
struct RawQuizQuestion {
    question: String,
    options: Vec<String>,
    correct_answer: String,
    #[serde(default)]
    explanation: String,
}

impl TryFrom<RawQuizQuestion> for QuizQuestion {
    type Error = QuizValidationError;

    fn try_from(raw: RawQuizQuestion) -> std::result::Result<Self, Self::Error> {
        Self::new(
            raw.question,
            raw.options,
            raw.correct_answer,
            raw.explanation,
        )
    }
}

impl QuizQuestion {
    /// Creates a question, enforcing the option invariants.
    ///
    /// The answer must match one option exactly as given (case- and
    /// whitespace-sensitive). Options and the answer are stored trimmed.
    ///
    /// # Errors
    ///
    /// Returns a [`QuizValidationError`] describing the first violated invariant.
    pub fn new(
        question: impl Into<String>,
        options: Vec<String>,
        correct_answer: impl Into<String>,
        explanation: impl Into<String>,
    ) -> std::result::Result<Self, QuizValidationError> {
        let question = question.into().trim().to_string();
        if question.is_empty() {
            return Err(QuizValidationError::EmptyQuestion);
        }

        if options.len() != QUIZ_OPTION_COUNT {
            return Err(QuizValidationError::WrongOptionCount(options.len()));
        }

        let correct_answer = correct_answer.into();
        if !options.contains(&correct_answer) {
            return Err(QuizValidationError::AnswerNotInOptions(correct_answer));
        }

        let options: Vec<String> = options.iter().map(|o| o.trim().to_string()).collect();
        for (i, option) in options.iter().enumerate() {
            if option.is_empty() {
                return Err(QuizValidationError::EmptyOption);
            }
            if options[..i].contains(option) {
                return Err(QuizValidationError::DuplicateOption(option.clone()));
            }
        }

        Ok(Self {
            question,
            options,
            correct_answer: correct_answer.trim().to_string(),
            explanation: explanation.into().trim().to_string(),
        })
    }

    /// The question text.
    #[must_use]
    pub fn question(&self) -> &str {
        &self.question
    }

    /// The four distinct options, in presentation order.
    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// The correct option.
    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    /// Why the correct option is correct.
    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    /// Zero-based position of the correct answer among the options.
    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.options
            .iter()
            .position(|o| *o == self.correct_answer)
            .unwrap_or_default()
    }
}

// ============================================================================
// DiagramImage
// ============================================================================

/// An encoded PNG diagram.
///
/// Serializes as standard base64 text.
#[derive(Clone, PartialEq, Eq)]
pub struct DiagramImage(Vec<u8>);

impl DiagramImage {
    /// Wraps encoded PNG bytes.
    #[must_use]
    pub const fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The encoded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the image, returning its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Base64 text as it appears in lesson JSON.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.0)
    }

    /// Decodes base64 text produced by [`DiagramImage::to_base64`].
    pub fn from_base64(text: &str) -> std::result::Result<Self, base64::DecodeError> {
        BASE64.decode(text.trim()).map(Self)
    }

    /// Size of the encoded image in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no bytes are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for DiagramImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "DiagramImage({} bytes)", self.0.len())
    }
}

impl Serialize for DiagramImage {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_base64())
    }
}

impl<'de> Deserialize<'de> for DiagramImage {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        Self::from_base64(&text)
            .map_err(|e| serde::de::Error::custom(format!("invalid base64 image: {e}")))
    }
}

// ============================================================================
// Lesson
// ============================================================================

/// A complete generated lesson.
///
/// `images[i]` illustrates `visual_cues[i]`. `id` and `created_at` are only
/// present once the lesson store has accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    /// Identifier assigned by the lesson store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// The requested topic.
    pub topic: String,

    /// The requested audience.
    pub age_group: AgeGroup,

    /// The requested depth.
    pub difficulty: Difficulty,

    /// Narrative explanation of the topic.
    pub story: String,

    /// Phrases describing what each diagram illustrates.
    pub visual_cues: Vec<String>,

    /// One diagram per visual cue, position-aligned.
    pub images: Vec<DiagramImage>,

    /// Multiple-choice questions; empty when quiz generation degraded.
    pub quiz: Vec<QuizQuestion>,

    /// When the lesson store accepted the lesson.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Lesson {
    /// Assembles an unsaved lesson from the stage outputs.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` if images and cues are not position-aligned.
    pub fn assemble(
        request: &LessonRequest,
        story: String,
        visual_cues: Vec<String>,
        images: Vec<DiagramImage>,
        quiz: Vec<QuizQuestion>,
    ) -> Result<Self> {
        if images.len() != visual_cues.len() {
            return Err(TechTalesError::invalid_transition(
                format!("{} diagrams", images.len()),
                format!("lesson with {} visual cues", visual_cues.len()),
            ));
        }

        Ok(Self {
            id: None,
            topic: request.topic.clone(),
            age_group: request.age_group,
            difficulty: request.difficulty,
            story,
            visual_cues,
            images,
            quiz,
            created_at: None,
        })
    }

    /// Returns `true` once a store has assigned an id.
    #[must_use]
    pub const fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    /// Pairs every visual cue with its diagram.
    pub fn figures(&self) -> impl Iterator<Item = (&str, &DiagramImage)> {
        self.visual_cues
            .iter()
            .map(String::as_str)
            .zip(self.images.iter())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn options(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn sample_request() -> LessonRequest {
        LessonRequest::new("OSI Layers", AgeGroup::Adult, Difficulty::Beginner, 200).unwrap()
    }

    #[test]
    fn test_age_group_parse_case_insensitive() {
        assert_eq!("Adult".parse::<AgeGroup>().unwrap(), AgeGroup::Adult);
        assert_eq!(" teen ".parse::<AgeGroup>().unwrap(), AgeGroup::Teen);
        let err = "senior".parse::<AgeGroup>().unwrap_err();
        assert!(matches!(err, TechTalesError::InvalidInput { ref field, .. } if field == "age_group"));
    }

    #[test]
    fn test_difficulty_parse() {
        assert_eq!(
            "ADVANCED".parse::<Difficulty>().unwrap(),
            Difficulty::Advanced
        );
        assert!("expert".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_selector_serialization() {
        assert_eq!(serde_json::to_string(&AgeGroup::Child).unwrap(), r#""child""#);
        assert_eq!(
            serde_json::to_string(&Difficulty::Intermediate).unwrap(),
            r#""intermediate""#
        );
    }

    #[test]
    fn test_request_rejects_blank_topic() {
        let err = LessonRequest::new("   ", AgeGroup::Teen, Difficulty::Beginner, 200).unwrap_err();
        assert!(matches!(err, TechTalesError::InvalidInput { ref field, .. } if field == "topic"));
    }

    #[test]
    fn test_request_rejects_long_topic() {
        let topic = "x".repeat(11);
        assert!(LessonRequest::new(&topic, AgeGroup::Teen, Difficulty::Beginner, 10).is_err());
    }

    #[test]
    fn test_request_parse_trims_topic() {
        let request = LessonRequest::parse("  DNS  ", "child", "beginner", 200).unwrap();
        assert_eq!(request.topic, "DNS");
        assert_eq!(request.age_group, AgeGroup::Child);
    }

    #[test]
    fn test_quiz_question_valid() {
        let q = QuizQuestion::new(
            "Which layer routes packets?",
            options(&["Physical", "Network", "Session", "Application"]),
            "Network",
            "Layer 3 handles routing.",
        )
        .unwrap();
        assert_eq!(q.correct_answer(), "Network");
        assert_eq!(q.correct_index(), 1);
        assert_eq!(q.options().len(), 4);
    }

    #[test]
    fn test_quiz_question_answer_must_be_option() {
        let err = QuizQuestion::new(
            "Q?",
            options(&["a", "b", "c", "d"]),
            "e",
            "",
        )
        .unwrap_err();
        assert_eq!(err, QuizValidationError::AnswerNotInOptions("e".to_string()));
    }

    #[test]
    fn test_quiz_question_answer_match_is_case_sensitive() {
        let err = QuizQuestion::new("Q?", options(&["Alpha", "b", "c", "d"]), "alpha", "");
        assert!(err.is_err());
    }

    #[test]
    fn test_quiz_question_answer_match_is_whitespace_sensitive() {
        let err = QuizQuestion::new("Q?", options(&["A1", "B1", "C1", "D1"]), " A1", "").unwrap_err();
        assert_eq!(err, QuizValidationError::AnswerNotInOptions(" A1".to_string()));

        // Matching padding on both sides is an exact match, stored trimmed.
        let q = QuizQuestion::new("Q?", options(&["A1 ", "B1", "C1", "D1"]), "A1 ", "").unwrap();
        assert_eq!(q.correct_answer(), "A1");
        assert_eq!(q.correct_index(), 0);
    }

    #[test]
    fn test_quiz_question_rejects_wrong_option_count() {
        let err = QuizQuestion::new("Q?", options(&["a", "b", "c"]), "a", "").unwrap_err();
        assert_eq!(err, QuizValidationError::WrongOptionCount(3));
    }

    #[test]
    fn test_quiz_question_rejects_duplicates() {
        let err = QuizQuestion::new("Q?", options(&["a", "b", "a ", "d"]), "a", "").unwrap_err();
        assert_eq!(err, QuizValidationError::DuplicateOption("a".to_string()));
    }

    #[test]
    fn test_quiz_question_deserialization_validates() {
        let ok = r#"{"question":"Q?","options":["a","b","c","d"],"correct_answer":"c","explanation":"because"}"#;
        let q: QuizQuestion = serde_json::from_str(ok).unwrap();
        assert_eq!(q.explanation(), "because");

        let bad = r#"{"question":"Q?","options":["a","b","c","d"],"correct_answer":"z","explanation":""}"#;
        let err = serde_json::from_str::<QuizQuestion>(bad).unwrap_err();
        assert!(err.to_string().contains("not among the options"));
    }

    #[test]
    fn test_diagram_image_serializes_as_base64() {
        let image = DiagramImage::new(vec![0x89, b'P', b'N', b'G']);
        let json = serde_json::to_string(&image).unwrap();
        assert_eq!(json, r#""iVBORw==""#);

        let back: DiagramImage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, image);
        assert_eq!(format!("{back:?}"), "DiagramImage(4 bytes)");
    }

    #[test]
    fn test_lesson_assemble_requires_alignment() {
        let request = sample_request();
        let err = Lesson::assemble(
            &request,
            "story".to_string(),
            vec!["cue".to_string()],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, TechTalesError::InvalidStateTransition { .. }));
    }

    #[test]
    fn test_lesson_json_shape() {
        let request = sample_request();
        let lesson = Lesson::assemble(
            &request,
            "Once upon a time".to_string(),
            vec!["osi layer stack".to_string()],
            vec![DiagramImage::new(vec![1, 2, 3])],
            vec![],
        )
        .unwrap();

        let value = serde_json::to_value(&lesson).unwrap();
        assert_eq!(value["topic"], "OSI Layers");
        assert_eq!(value["age_group"], "adult");
        assert_eq!(value["difficulty"], "beginner");
        assert_eq!(value["images"][0], "AQID");
        assert!(value.get("id").is_none());
        assert!(!lesson.is_saved());
        assert_eq!(lesson.figures().count(), 1);
    }
}
