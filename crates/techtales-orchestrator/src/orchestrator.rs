//! Lesson orchestration.
//!
//! Runs story generation, then diagram synthesis and quiz generation side by
//! side, assembles the lesson and hands it to the store. Story failures fail
//! the request; quiz failures degrade to an empty quiz; diagrams never fail.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{error, info, warn};

use crate::config::{Config, LessonLimits};
use crate::diagram::DiagramSynthesizer;
use crate::error::Result;
use crate::lesson::{DiagramImage, Lesson, LessonRequest};
use crate::llm::{model_from_config, TextAdapter};
use crate::pipeline::{PipelineRun, PipelineStatus};
use crate::quiz::QuizStage;
use crate::story::StoryStage;
use crate::store::{store_from_config, LessonStore};

/// Sequences the generation stages for each lesson request.
pub struct LessonOrchestrator {
    story: StoryStage,
    quiz: QuizStage,
    synthesizer: DiagramSynthesizer,
    store: Arc<dyn LessonStore>,
    limits: LessonLimits,
}

impl std::fmt::Debug for LessonOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LessonOrchestrator")
            .field("story", &self.story)
            .field("quiz", &self.quiz)
            .field("synthesizer", &self.synthesizer)
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

impl LessonOrchestrator {
    /// Creates an orchestrator from its collaborators.
    #[must_use]
    pub fn new(adapter: TextAdapter, store: Arc<dyn LessonStore>, config: &Config) -> Self {
        let timeout = config.request_timeout();
        Self {
            story: StoryStage::new(adapter.clone(), config.lesson.max_visual_cues, timeout),
            quiz: QuizStage::new(adapter, &config.lesson, timeout),
            synthesizer: DiagramSynthesizer::new(config.diagram),
            store,
            limits: config.lesson.clone(),
        }
    }

    /// Creates an orchestrator with the configured model backend and store.
    ///
    /// # Errors
    ///
    /// Returns an error if the model backend cannot be set up.
    pub fn from_config(config: &Config) -> Result<Self> {
        let adapter = TextAdapter::new(model_from_config(config)?);
        Ok(Self::new(adapter, store_from_config(config), config))
    }

    /// The store lessons are handed to.
    #[must_use]
    pub fn store(&self) -> Arc<dyn LessonStore> {
        Arc::clone(&self.store)
    }

    /// Validates raw request fields against the configured topic limit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a blank or oversized topic or an unknown selector.
    pub fn parse_request(
        &self,
        topic: &str,
        age_group: &str,
        difficulty: &str,
    ) -> Result<LessonRequest> {
        LessonRequest::parse(topic, age_group, difficulty, self.limits.max_topic_chars)
    }

    /// Validates the raw fields and generates a lesson.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for a bad request or `StageError(story)` when
    /// no narrative could be produced.
    pub async fn generate_lesson(
        &self,
        topic: &str,
        age_group: &str,
        difficulty: &str,
    ) -> Result<Lesson> {
        let request = self.parse_request(topic, age_group, difficulty)?;
        self.generate(&request).await
    }

    /// Generates a lesson for a validated request.
    ///
    /// # Errors
    ///
    /// Returns `StageError(story)` when no narrative could be produced.
    pub async fn generate(&self, request: &LessonRequest) -> Result<Lesson> {
        let mut run = PipelineRun::new();
        self.generate_with(request, &mut run).await
    }

    /// Generates a lesson, recording every state transition in `run`.
    ///
    /// Dropping the returned future abandons in-flight model calls and
    /// persists nothing.
    ///
    /// # Errors
    ///
    /// Returns `StageError(story)` when no narrative could be produced; `run`
    /// is then `Failed`.
    pub async fn generate_with(&self, request: &LessonRequest, run: &mut PipelineRun) -> Result<Lesson> {
        info!(
            topic = %request.topic,
            age_group = %request.age_group,
            difficulty = %request.difficulty,
            "Lesson requested"
        );

        let story = match self.story.generate(request).await {
            Ok(story) => story,
            Err(e) => {
                error!(topic = %request.topic, error = %e, "Lesson failed");
                run.fail(e.to_string());
                return Err(e);
            }
        };
        run.advance_with(
            PipelineStatus::StoryGenerated,
            Some(format!("{} visual cues", story.visual_cues.len())),
        )?;

        let (images, quiz) = tokio::join!(
            self.synthesize_all(&story.visual_cues),
            self.quiz.generate(&story.story, request),
        );
        run.advance_with(
            PipelineStatus::DiagramsSynthesized,
            Some(format!("{} diagrams", images.len())),
        )?;

        let quiz = match quiz {
            Ok(questions) => {
                run.advance_with(
                    PipelineStatus::QuizGenerated,
                    Some(format!("{} questions", questions.len())),
                )?;
                questions
            }
            Err(e) => {
                warn!(topic = %request.topic, error = %e, "Quiz degraded to empty");
                Vec::new()
            }
        };

        let mut lesson =
            match Lesson::assemble(request, story.story, story.visual_cues, images, quiz) {
                Ok(lesson) => lesson,
                Err(e) => {
                    run.fail(e.to_string());
                    return Err(e);
                }
            };
        let degraded = !run.reached(PipelineStatus::QuizGenerated);
        run.advance_with(
            PipelineStatus::Assembled,
            degraded.then_some("quiz degraded to empty"),
        )?;

        match self.store.save(&lesson).await {
            Ok(saved) => {
                saved.stamp(&mut lesson);
                info!(
                    id = %saved.id,
                    topic = %lesson.topic,
                    visual_cues = lesson.visual_cues.len(),
                    questions = lesson.quiz.len(),
                    "Lesson assembled and saved"
                );
            }
            Err(e) => {
                warn!(topic = %lesson.topic, error = %e, "Lesson assembled but not saved");
            }
        }

        Ok(lesson)
    }

    /// Draws one diagram per cue, in order, concurrently.
    ///
    /// A cue whose drawing task dies still gets a placeholder, so the result
    /// always has one image per cue.
    pub async fn synthesize_all(&self, cues: &[String]) -> Vec<DiagramImage> {
        let tasks = cues.iter().cloned().map(|cue| {
            let synthesizer = self.synthesizer;
            tokio::task::spawn_blocking(move || synthesizer.synthesize(&cue))
        });
        let results = join_all(tasks).await;

        results
            .into_iter()
            .zip(cues)
            .enumerate()
            .map(|(cue_index, (result, cue))| {
                result.unwrap_or_else(|e| {
                    warn!(cue_index, error = %e, "Diagram task failed; using placeholder");
                    self.synthesizer.placeholder(cue)
                })
            })
            .collect()
    }
}
