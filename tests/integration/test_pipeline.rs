//! End-to-end tests for the lesson pipeline.
//!
//! These tests drive the real orchestrator, stages, diagram synthesizer and
//! stores with a scripted language model, so no network access is needed.

use std::path::PathBuf;
use std::sync::Arc;

use techtales_export::{write_bundle, MarkdownExporter};
use techtales_orchestrator::{
    Archetype, Config, DiagramSynthesizer, FileLessonStore, LessonOrchestrator, LessonStore,
    LlmErrorKind, MemoryLessonStore, PipelineRun, PipelineStatus, Reply, ScriptedModel, Stage,
    TechTalesError, TextAdapter, QUIZ_OPTION_COUNT,
};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

const OSI_STORY: &str = "Imagine a letter travelling through a seven-floor post office. \
Each floor wraps the letter in a new envelope before handing it down.\n\n\
```json\n\
[\"The OSI layer stack from physical to application\", \
\"A database table storing routing entries\", \
\"Network nodes passing a packet\"]\n\
```";

/// Builds a fenced quiz reply with `count` valid questions.
fn quiz_reply(count: usize) -> String {
    let items: Vec<String> = (1..=count).map(valid_question).collect();
    format!("Here is your quiz:\n```json\n[{}]\n```", items.join(",\n"))
}

fn valid_question(n: usize) -> String {
    format!(
        r#"{{"question": "Which layer handles concern {n}?", "options": ["Physical {n}", "Network {n}", "Transport {n}", "Application {n}"], "correct_answer": "Network {n}", "explanation": "Layer fact {n}."}}"#
    )
}

fn test_config() -> Config {
    Config {
        request_timeout_seconds: 1,
        ..Config::default()
    }
}

fn orchestrator_with(
    replies: Vec<Reply>,
    store: Arc<dyn LessonStore>,
) -> (LessonOrchestrator, Arc<ScriptedModel>) {
    let model = Arc::new(ScriptedModel::new(replies));
    let adapter = TextAdapter::new(model.clone());
    (LessonOrchestrator::new(adapter, store, &test_config()), model)
}

fn temp_dir(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("techtales_it_{name}_{}", uuid::Uuid::new_v4()))
}

// ============================================================================
// Lesson scenarios
// ============================================================================

#[tokio::test]
async fn test_osi_layers_lesson() {
    let store = Arc::new(MemoryLessonStore::new());
    let (orchestrator, model) = orchestrator_with(
        vec![Reply::text(OSI_STORY), Reply::text(quiz_reply(5))],
        store.clone(),
    );

    let lesson = orchestrator
        .generate_lesson("OSI Layers", "adult", "beginner")
        .await
        .unwrap();

    assert!(!lesson.story.trim().is_empty());
    assert!(!lesson.story.contains("```"));
    assert!(lesson.visual_cues.len() <= 5);
    assert_eq!(lesson.visual_cues.len(), 3);
    assert_eq!(lesson.images.len(), lesson.visual_cues.len());
    assert_eq!(lesson.quiz.len(), 5);

    for question in &lesson.quiz {
        let options = question.options();
        assert_eq!(options.len(), QUIZ_OPTION_COUNT);
        for (i, option) in options.iter().enumerate() {
            assert!(!options[..i].contains(option), "duplicate option {option}");
        }
        assert!(options.iter().any(|o| o == question.correct_answer()));
    }

    for image in &lesson.images {
        assert!(image.as_bytes().starts_with(&PNG_SIGNATURE));
    }

    assert!(lesson.is_saved());
    assert_eq!(store.len().await, 1);
    assert_eq!(model.calls(), 2);

    let prompts = model.prompts();
    assert!(prompts[0].user.contains("OSI Layers"));
    assert!(prompts[1].user.contains("seven-floor post office"));
}

#[tokio::test]
async fn test_adapter_timeout_fails_story_and_persists_nothing() {
    let store = Arc::new(MemoryLessonStore::new());
    let (orchestrator, _model) = orchestrator_with(vec![Reply::Hang], store.clone());

    let request = orchestrator
        .parse_request("OSI Layers", "adult", "beginner")
        .unwrap();
    let mut run = PipelineRun::new();
    let err = orchestrator.generate_with(&request, &mut run).await.unwrap_err();

    assert!(matches!(
        err,
        TechTalesError::StageError {
            stage: Stage::Story,
            ..
        }
    ));
    assert!(err.is_user_visible());
    assert_eq!(run.status, PipelineStatus::Failed);
    assert!(run.failure.is_some());
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_quiz_failure_degrades_to_empty_quiz() {
    let store = Arc::new(MemoryLessonStore::new());
    let (orchestrator, model) = orchestrator_with(
        vec![Reply::text(OSI_STORY), Reply::Fail(LlmErrorKind::Server)],
        store.clone(),
    );

    let request = orchestrator
        .parse_request("OSI Layers", "adult", "beginner")
        .unwrap();
    let mut run = PipelineRun::new();
    let lesson = orchestrator.generate_with(&request, &mut run).await.unwrap();

    assert!(lesson.quiz.is_empty());
    assert_eq!(lesson.images.len(), lesson.visual_cues.len());
    assert!(lesson.is_saved());
    assert_eq!(run.status, PipelineStatus::Assembled);
    assert!(!run.reached(PipelineStatus::QuizGenerated));
    // One story call plus every quiz attempt.
    assert_eq!(model.calls(), 1 + 2);
}

#[tokio::test]
async fn test_fenced_quiz_with_one_malformed_question() {
    let mut items: Vec<String> = (1..=5).map(valid_question).collect();
    items.insert(
        2,
        r#"{"question": "Which one is right?", "options": ["a", "b", "c", "d"], "correct_answer": "e", "explanation": "None of them."}"#
            .to_string(),
    );
    let reply = format!("```json\n[{}]\n```", items.join(","));

    let (orchestrator, model) = orchestrator_with(
        vec![Reply::text(OSI_STORY), Reply::text(reply)],
        Arc::new(MemoryLessonStore::new()),
    );

    let lesson = orchestrator
        .generate_lesson("OSI Layers", "adult", "beginner")
        .await
        .unwrap();

    assert_eq!(lesson.quiz.len(), 5);
    assert!(lesson
        .quiz
        .iter()
        .all(|q| q.question() != "Which one is right?"));
    assert_eq!(model.calls(), 2);
}

#[tokio::test]
async fn test_invalid_request_never_calls_model() {
    let (orchestrator, model) =
        orchestrator_with(vec![Reply::text(OSI_STORY)], Arc::new(MemoryLessonStore::new()));

    for (topic, age, difficulty) in [
        ("", "adult", "beginner"),
        ("OSI Layers", "toddler", "beginner"),
        ("OSI Layers", "adult", "expert"),
    ] {
        let err = orchestrator
            .generate_lesson(topic, age, difficulty)
            .await
            .unwrap_err();
        assert!(matches!(err, TechTalesError::InvalidInput { .. }));
    }
    assert_eq!(model.calls(), 0);
}

// ============================================================================
// Diagrams
// ============================================================================

#[test]
fn test_archetype_classification() {
    assert_eq!(
        Archetype::classify("Explain the OSI layer stack"),
        Archetype::Layered
    );
    assert_eq!(
        Archetype::classify("database table storage"),
        Archetype::CylindricalStore
    );
    assert_eq!(
        Archetype::classify("network node topology"),
        Archetype::NodeGraph
    );
    assert_eq!(Archetype::classify("a cat eating soup"), Archetype::Generic);
}

#[test]
fn test_synthesizer_always_returns_png() {
    let synthesizer = DiagramSynthesizer::default();
    for cue in ["", "   ", "a cat eating soup", "OSI", "\u{1F600} emoji only"] {
        let image = synthesizer.synthesize(cue);
        assert!(image.as_bytes().starts_with(&PNG_SIGNATURE), "cue {cue:?}");
    }
}

// ============================================================================
// Persistence and export
// ============================================================================

#[tokio::test]
async fn test_file_store_and_bundle_export() {
    let lessons_dir = temp_dir("lessons");
    let bundle_dir = temp_dir("bundle");
    let store = Arc::new(FileLessonStore::new(&lessons_dir));
    let (orchestrator, _model) = orchestrator_with(
        vec![Reply::text(OSI_STORY), Reply::text(quiz_reply(5))],
        store.clone(),
    );

    let lesson = orchestrator
        .generate_lesson("OSI Layers", "adult", "beginner")
        .await
        .unwrap();
    let id = lesson.id.clone().unwrap();

    let listed = store.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    let loaded = store.get(&id).await.unwrap();
    assert_eq!(loaded, lesson);

    let bundle = write_bundle(&loaded, &bundle_dir).unwrap();
    assert_eq!(bundle.diagrams.len(), 3);
    let markdown = std::fs::read_to_string(&bundle.markdown).unwrap();
    assert_eq!(markdown, MarkdownExporter::new(&loaded).generate());
    assert!(markdown.contains("### Question 5"));
    assert!(markdown.contains(&format!("| Lesson ID | {id} |")));

    std::fs::remove_dir_all(&lessons_dir).ok();
    std::fs::remove_dir_all(&bundle_dir).ok();
}
