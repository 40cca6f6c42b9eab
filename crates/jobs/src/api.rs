//! Job polling surface: `GET /jobs/:id`.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::json;

use storyreel_common::error::{ReelError, ReelResult};
use storyreel_model::job::{JobStatus, RenderJob};
use storyreel_model::timeline::Timeline;

use crate::orchestrator::JobQuery;

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<ReelError> for ApiError {
    fn from(err: ReelError) -> Self {
        match err {
            ReelError::JobNotFound { id } => ApiError::NotFound(format!("job {id}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobQuery,
    /// Prefix for `videoUrl`; the file path is reported when unset.
    pub video_base_url: Option<String>,
}

impl AppState {
    pub fn new(jobs: JobQuery, video_base_url: Option<String>) -> Self {
        Self {
            jobs,
            video_base_url,
        }
    }
}

/// Wire shape of a job snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub video_url: Option<String>,
    pub timeline: Option<Timeline>,
}

impl JobResponse {
    pub fn from_job(job: RenderJob, video_base_url: Option<&str>) -> Self {
        let video_url = match (job.status, &job.video_path) {
            (JobStatus::Completed, Some(path)) => Some(match video_base_url {
                Some(base) => {
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    format!("{}/{name}", base.trim_end_matches('/'))
                }
                None => path.display().to_string(),
            }),
            _ => None,
        };

        Self {
            id: job.id,
            status: job.status,
            error: job.error,
            video_url,
            timeline: job.timeline,
        }
    }
}

async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<JobResponse>> {
    let job = state.jobs.get(&id).await?;
    Ok(Json(JobResponse::from_job(job, state.video_base_url.as_deref())))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs/:id", get(get_job))
        .with_state(state)
}

/// Serve the router until the listener fails.
pub async fn serve(state: AppState, bind: &str) -> ReelResult<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "Job API listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
