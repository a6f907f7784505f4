//! Lesson persistence.
//!
//! [`LessonStore`] is the collaborator finished lessons are handed to. The
//! store, not the pipeline, assigns `id` and `created_at`. Two backends are
//! provided: process memory and one JSON file per lesson in a directory.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::{Config, StorageBackend};
use crate::error::{Result, TechTalesError};
use crate::lesson::Lesson;

/// Identity assigned to a lesson when it is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedLesson {
    /// Lesson id (UUID v4).
    pub id: String,
    /// When the lesson was stored.
    pub created_at: DateTime<Utc>,
}

impl SavedLesson {
    fn generate() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }

    /// Copies the identity onto `lesson`.
    pub fn stamp(&self, lesson: &mut Lesson) {
        lesson.id = Some(self.id.clone());
        lesson.created_at = Some(self.created_at);
    }
}

/// Storage for finished lessons.
#[async_trait]
pub trait LessonStore: Send + Sync {
    /// Stores a lesson under a new id.
    async fn save(&self, lesson: &Lesson) -> Result<SavedLesson>;

    /// Fetches a stored lesson.
    ///
    /// Fails with `LessonNotFound` for unknown ids.
    async fn get(&self, id: &str) -> Result<Lesson>;

    /// All stored lessons, most recent first.
    async fn list(&self) -> Result<Vec<Lesson>>;
}

/// Builds the store selected in the configuration.
#[must_use]
pub fn store_from_config(config: &Config) -> Arc<dyn LessonStore> {
    match config.storage.backend {
        StorageBackend::Memory => Arc::new(MemoryLessonStore::new()),
        StorageBackend::File => Arc::new(FileLessonStore::new(&config.storage.dir)),
    }
}

/// Orders lessons newest first; ties keep the order given.
fn newest_first(lessons: &mut [Lesson]) {
    lessons.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

// ============================================================================
// Memory
// ============================================================================

/// Keeps lessons in process memory.
#[derive(Debug, Default)]
pub struct MemoryLessonStore {
    lessons: RwLock<Vec<Lesson>>,
}

impl MemoryLessonStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored lessons.
    pub async fn len(&self) -> usize {
        self.lessons.read().await.len()
    }

    /// Returns `true` if nothing has been stored.
    pub async fn is_empty(&self) -> bool {
        self.lessons.read().await.is_empty()
    }
}

#[async_trait]
impl LessonStore for MemoryLessonStore {
    async fn save(&self, lesson: &Lesson) -> Result<SavedLesson> {
        let saved = SavedLesson::generate();
        let mut stored = lesson.clone();
        saved.stamp(&mut stored);
        self.lessons.write().await.push(stored);
        debug!(id = %saved.id, "Lesson saved in memory");
        Ok(saved)
    }

    async fn get(&self, id: &str) -> Result<Lesson> {
        self.lessons
            .read()
            .await
            .iter()
            .find(|lesson| lesson.id.as_deref() == Some(id))
            .cloned()
            .ok_or_else(|| TechTalesError::lesson_not_found(id))
    }

    async fn list(&self) -> Result<Vec<Lesson>> {
        let mut lessons: Vec<Lesson> = self.lessons.read().await.iter().rev().cloned().collect();
        newest_first(&mut lessons);
        Ok(lessons)
    }
}

// ============================================================================
// File
// ============================================================================

/// Stores each lesson as `<id>.json` in a directory.
#[derive(Debug, Clone)]
pub struct FileLessonStore {
    dir: PathBuf,
}

impl FileLessonStore {
    /// Creates a store rooted at `dir`. The directory is created on first save.
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// The storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file for `id`, or `None` if `id` is not a lesson id.
    fn path_for(&self, id: &str) -> Option<PathBuf> {
        let id = Uuid::parse_str(id).ok()?;
        Some(self.dir.join(format!("{id}.json")))
    }

    async fn read_lesson(path: &Path) -> Result<Lesson> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| TechTalesError::storage(path, e.to_string()))?;
        serde_json::from_str(&contents).map_err(|e| TechTalesError::storage(path, e.to_string()))
    }
}

#[async_trait]
impl LessonStore for FileLessonStore {
    async fn save(&self, lesson: &Lesson) -> Result<SavedLesson> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| TechTalesError::storage(&self.dir, e.to_string()))?;

        let saved = SavedLesson::generate();
        let mut stored = lesson.clone();
        saved.stamp(&mut stored);

        let path = self.dir.join(format!("{}.json", saved.id));
        let partial = self.dir.join(format!("{}.json.tmp", saved.id));
        let contents = serde_json::to_vec_pretty(&stored)?;

        tokio::fs::write(&partial, contents)
            .await
            .map_err(|e| TechTalesError::storage(&partial, e.to_string()))?;
        tokio::fs::rename(&partial, &path)
            .await
            .map_err(|e| TechTalesError::storage(&path, e.to_string()))?;

        debug!(id = %saved.id, path = %path.display(), "Lesson saved to disk");
        Ok(saved)
    }

    async fn get(&self, id: &str) -> Result<Lesson> {
        let Some(path) = self.path_for(id) else {
            return Err(TechTalesError::lesson_not_found(id));
        };
        match tokio::fs::try_exists(&path).await {
            Ok(true) => Self::read_lesson(&path).await,
            Ok(false) => Err(TechTalesError::lesson_not_found(id)),
            Err(e) => Err(TechTalesError::storage(&path, e.to_string())),
        }
    }

    async fn list(&self) -> Result<Vec<Lesson>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(TechTalesError::storage(&self.dir, e.to_string())),
        };

        let mut lessons = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| TechTalesError::storage(&self.dir, e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read_lesson(&path).await {
                Ok(lesson) => lessons.push(lesson),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable lesson"),
            }
        }

        newest_first(&mut lessons);
        Ok(lessons)
    }
}
