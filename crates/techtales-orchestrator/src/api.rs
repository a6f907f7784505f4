//! HTTP API for lesson generation.
//!
//! # Endpoints
//!
//! - `GET /api/` - Service banner
//! - `POST /api/generate-lesson` - Generate, store and return a lesson
//! - `GET /api/lessons` - All stored lessons, most recent first
//! - `GET /api/lessons/{id}` - One stored lesson
//!
//! # Example
//!
//! ```no_run
//! use techtales_orchestrator::{create_router, AppState, Config};
//!
//! # async fn example() {
//! let config = Config::load().unwrap();
//! let state = AppState::from_config(config).unwrap();
//!
//! let router = create_router(state);
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8001").await.unwrap();
//! axum::serve(listener, router).await.unwrap();
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::error::{Stage, TechTalesError};
use crate::{Config, Lesson, LessonOrchestrator};

/// Banner returned by `GET /api/`.
pub const SERVICE_BANNER: &str = "TechTales AI Educational App";

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for the generate-lesson endpoint.
///
/// Selectors arrive as strings and are validated by the orchestrator, so a
/// missing or unknown value is reported as a 400 with a readable message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateLessonRequest {
    /// Topic to explain.
    #[serde(default)]
    pub topic: String,
    /// `child`, `teen` or `adult`.
    #[serde(default)]
    pub age_group: String,
    /// `beginner`, `intermediate` or `advanced`.
    #[serde(default)]
    pub difficulty: String,
}

/// Response body for the banner endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BannerResponse {
    /// Service name.
    pub message: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Configuration the server was started with.
    pub config: Config,
    /// The lesson pipeline, including its store.
    pub orchestrator: Arc<LessonOrchestrator>,
}

impl AppState {
    /// Creates state around an existing orchestrator.
    #[must_use]
    pub fn new(config: Config, orchestrator: LessonOrchestrator) -> Self {
        Self {
            config,
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Creates state with the configured model backend and store.
    ///
    /// # Errors
    ///
    /// Returns an error if the model backend cannot be set up.
    pub fn from_config(config: Config) -> crate::Result<Self> {
        let orchestrator = LessonOrchestrator::from_config(&config)?;
        Ok(Self::new(config, orchestrator))
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Error type for API handlers.
#[derive(Debug)]
struct ApiError(TechTalesError);

impl From<TechTalesError> for ApiError {
    fn from(err: TechTalesError) -> Self {
        Self(err)
    }
}

impl ApiError {
    const fn status(&self) -> StatusCode {
        match &self.0 {
            TechTalesError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            TechTalesError::LessonNotFound { .. } => StatusCode::NOT_FOUND,
            TechTalesError::StageError {
                stage: Stage::Story,
                ..
            } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(status = %status, error = %self.0, "Request failed");
        }
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with all API endpoints.
///
/// The router carries:
/// - All API routes under `/api`
/// - Permissive CORS for a browser frontend on another origin
/// - Tracing middleware for request logging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/generate-lesson", post(handle_generate_lesson))
        .route("/lessons", get(handle_list_lessons))
        .route("/lessons/:id", get(handle_get_lesson));

    Router::new()
        .route("/api", get(handle_banner))
        .route("/api/", get(handle_banner))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

// ============================================================================
// Handlers
// ============================================================================

/// Handler for `GET /api/`.
async fn handle_banner() -> Json<BannerResponse> {
    Json(BannerResponse {
        message: SERVICE_BANNER.to_string(),
    })
}

/// Handler for `POST /api/generate-lesson`.
async fn handle_generate_lesson(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateLessonRequest>,
) -> Result<Json<Lesson>, ApiError> {
    info!(topic = %request.topic, "Received lesson request");
    let lesson = state
        .orchestrator
        .generate_lesson(&request.topic, &request.age_group, &request.difficulty)
        .await?;
    Ok(Json(lesson))
}

/// Handler for `GET /api/lessons`.
async fn handle_list_lessons(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Lesson>>, ApiError> {
    let lessons = state.orchestrator.store().list().await?;
    Ok(Json(lessons))
}

/// Handler for `GET /api/lessons/{id}`.
async fn handle_get_lesson(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Lesson>, ApiError> {
    let lesson = state.orchestrator.store().get(&id).await?;
    Ok(Json(lesson))
}

// ============================================================================
// Tests
// ============================================================================
