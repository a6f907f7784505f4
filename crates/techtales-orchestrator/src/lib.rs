//! TechTales Lesson Orchestrator
//!
//! Turns a topic, age group and difficulty into a lesson: a narrative, one
//! procedural diagram per visual cue, and a multiple-choice quiz. Also serves
//! the pipeline over HTTP.

pub mod api;
pub mod config;
pub mod diagram;
pub mod error;
pub mod extract;
pub mod lesson;
pub mod llm;
pub mod orchestrator;
pub mod pipeline;
pub mod quiz;
pub mod store;
pub mod story;

pub use api::{create_router, AppState, ErrorResponse, GenerateLessonRequest, SERVICE_BANNER};
pub use config::{
    Config, DiagramConfig, LessonLimits, LlmProvider, StorageBackend, StorageConfig,
    MAX_QUIZ_ATTEMPTS,
};
pub use diagram::{Archetype, DiagramError, DiagramSynthesizer};
pub use error::{LlmErrorKind, Result, Stage, TechTalesError};
pub use extract::{extract, Shape};
pub use lesson::{
    AgeGroup, DiagramImage, Difficulty, Lesson, LessonRequest, QuizQuestion, QuizValidationError,
    QUIZ_OPTION_COUNT,
};
pub use llm::{model_from_config, LanguageModel, Prompt, Reply, ScriptedModel, TextAdapter};
pub use orchestrator::LessonOrchestrator;
pub use pipeline::{PipelineRun, PipelineStatus, TransitionRecord};
pub use quiz::QuizStage;
pub use store::{
    store_from_config, FileLessonStore, LessonStore, MemoryLessonStore, SavedLesson,
};
pub use story::{StoryOutput, StoryStage};
