//! HTTP server for the search surface.
//!
//! A thin JSON transport over [`SearchService`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/sources` | Configured listing sources and their health |
//! | `PUT`  | `/preferences/{ref}` | Register resolved preferences for a criteria ref |
//! | `GET`  | `/preferences/{ref}` | Read them back |
//! | `POST` | `/search/start` | Start a search: `{criteria_ref}` |
//! | `GET`  | `/search/{id}/status` | Progress projection |
//! | `GET`  | `/search/{id}/results` | Deduplicated listings |
//! | `GET`  | `/search/{id}/evaluated-results` | Listings with evaluations |
//! | `GET`  | `/search/{id}/final-results` | Final reports, best first |
//! | `POST` | `/search/feedback` | Like/dislike: `{session_id, listing_id, action}` |
//! | `GET`  | `/search/{id}/next` | Next unseen report |
//! | `GET`  | `/search/{id}/insights` | Learning insights |
//! | `GET`  | `/search/{id}/feedback` | Swipe history |
//! | `GET`  | `/search/{id}/ranked-results` | Final reports in personalized order |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_ready", "message": "Search ... is not complete yet" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `not_ready` (409),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients can
//! poll directly.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::learner::{FeedbackRecord, LearningInsights};
use crate::models::{EvaluatedListing, FinalReport, Listing, Preferences, StatusView};
use crate::service::{FeedbackRequest, SearchService, ServiceError, StartedSearch};
use crate::sources::{get_sources, SourceStatus};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub service: SearchService,
}

/// Starts the HTTP server on `[server].bind` and runs until the process exits.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = SearchService::from_config(config).await?;
    let state = AppState {
        config: Arc::new(config.clone()),
        service,
    };

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "search server listening");
    axum::serve(listener, build_router(state)).await?;

    Ok(())
}

/// All routes with CORS applied.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/sources", get(handle_sources))
        .route(
            "/preferences/{criteria_ref}",
            get(handle_get_preferences).put(handle_put_preferences),
        )
        .route("/search/start", post(handle_start))
        .route("/search/feedback", post(handle_feedback))
        .route("/search/{id}/status", get(handle_status))
        .route("/search/{id}/results", get(handle_results))
        .route("/search/{id}/evaluated-results", get(handle_evaluated))
        .route("/search/{id}/final-results", get(handle_final))
        .route("/search/{id}/next", get(handle_next))
        .route("/search/{id}/insights", get(handle_insights))
        .route("/search/{id}/feedback", get(handle_feedback_history))
        .route("/search/{id}/ranked-results", get(handle_ranked))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let (status, code) = match &err {
            ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ServiceError::NotReady(_) => (StatusCode::CONFLICT, "not_ready"),
            ServiceError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServiceError::Internal(e) => {
                tracing::error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
            message: rejection.body_text(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ============ Meta ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct SourcesResponse {
    sources: Vec<SourceStatus>,
}

async fn handle_sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    Json(SourcesResponse {
        sources: get_sources(&state.config),
    })
}

// ============ Preferences ============

async fn handle_put_preferences(
    State(state): State<AppState>,
    Path(criteria_ref): Path<String>,
    body: Result<Json<Preferences>, JsonRejection>,
) -> ApiResult<Preferences> {
    let Json(preferences) = body?;
    state
        .service
        .put_preferences(&criteria_ref, preferences.clone())?;
    Ok(Json(preferences))
}

async fn handle_get_preferences(
    State(state): State<AppState>,
    Path(criteria_ref): Path<String>,
) -> ApiResult<Preferences> {
    Ok(Json(state.service.get_preferences(&criteria_ref)?))
}

// ============ Search ============

#[derive(Deserialize)]
struct StartRequest {
    criteria_ref: String,
}

async fn handle_start(
    State(state): State<AppState>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> ApiResult<StartedSearch> {
    let Json(request) = body?;
    Ok(Json(state.service.start_search(&request.criteria_ref).await?))
}

async fn handle_status(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<StatusView> {
    Ok(Json(state.service.status(&id).await?))
}

async fn handle_results(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Vec<Listing>> {
    Ok(Json(state.service.results(&id).await?))
}

async fn handle_evaluated(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<EvaluatedListing>> {
    Ok(Json(state.service.evaluated_results(&id).await?))
}

async fn handle_final(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Vec<FinalReport>> {
    Ok(Json(state.service.final_results(&id).await?))
}

async fn handle_ranked(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Vec<FinalReport>> {
    Ok(Json(state.service.ranked_results(&id).await?))
}

// ============ Feedback ============

#[derive(Serialize)]
struct FeedbackResponse {
    status: String,
    learning_insights: LearningInsights,
}

async fn handle_feedback(
    State(state): State<AppState>,
    body: Result<Json<FeedbackRequest>, JsonRejection>,
) -> ApiResult<FeedbackResponse> {
    let Json(request) = body?;
    let insights = state.service.submit_feedback(&request).await?;
    Ok(Json(FeedbackResponse {
        status: "success".to_string(),
        learning_insights: insights,
    }))
}

#[derive(Serialize)]
struct NextResponse {
    listing: Option<FinalReport>,
    all_seen: bool,
}

async fn handle_next(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<NextResponse> {
    let next = state.service.next(&id).await?;
    Ok(Json(NextResponse {
        all_seen: next.is_none(),
        listing: next,
    }))
}

#[derive(Serialize)]
struct InsightsResponse {
    session_id: String,
    insights: LearningInsights,
}

async fn handle_insights(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<InsightsResponse> {
    let insights = state.service.insights(&id).await?;
    Ok(Json(InsightsResponse {
        session_id: id,
        insights,
    }))
}

async fn handle_feedback_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<FeedbackRecord>> {
    Ok(Json(state.service.feedback_history(&id).await?))
}
