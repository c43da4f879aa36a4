//! Submission and status API handlers.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use ingestor_core::{IngestionError, IngestionStatus, ItemId, Priority, SubmitRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for a submission
#[derive(Debug, Deserialize)]
pub struct IngestBody {
    /// Item identifiers, integers or strings
    pub ids: Vec<ItemId>,
    /// Priority tier (defaults to MEDIUM)
    #[serde(default)]
    pub priority: Priority,
}

/// Response for an accepted submission
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ingestion_id: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct IngestErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<IngestErrorResponse>);

fn error_response(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(IngestErrorResponse {
            error: error.into(),
        }),
    )
}

impl From<IngestionError> for IngestErrorResponse {
    fn from(e: IngestionError) -> Self {
        Self {
            error: e.to_string(),
        }
    }
}

fn status_for(e: &IngestionError) -> StatusCode {
    match e {
        IngestionError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        IngestionError::NotFound(_) | IngestionError::BatchNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        IngestionError::InvalidTransition { .. } => StatusCode::CONFLICT,
        IngestionError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn ingestion_error(e: IngestionError) -> ApiError {
    (status_for(&e), Json(IngestErrorResponse::from(e)))
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a list of ids for processing
///
/// Every malformed body (invalid JSON, wrong content type, missing or
/// mistyped fields, unknown priority) is answered with 422.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    body: Result<Json<IngestBody>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        warn!("Rejected submission: {}", rejection.body_text());
        ingestor_core::metrics::SUBMISSIONS_REJECTED.inc();
        error_response(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text())
    })?;

    let ingestion_id = state
        .ingestion()
        .submit(SubmitRequest {
            ids: body.ids,
            priority: body.priority,
        })
        .map_err(ingestion_error)?;

    Ok(Json(IngestResponse { ingestion_id }))
}

/// Get the status of an ingestion by ID
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<IngestionStatus>, ApiError> {
    state
        .ingestion()
        .get_status(&id)
        .map(Json)
        .map_err(ingestion_error)
}
