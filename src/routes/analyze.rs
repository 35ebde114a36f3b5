use crate::{
    server::SharedState,
    service::{AnalyzeOutcome, ServiceValidationError},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Deserialize, Serialize)]
pub struct AnalyzeCameraRequest {
    pub entity_id: String,
}

#[derive(Error, Debug)]
pub enum AnalyzeError {
    #[error("Invalid request body: {0}")]
    Body(#[from] JsonRejection),
    #[error(transparent)]
    Validation(#[from] ServiceValidationError),
}

impl IntoResponse for AnalyzeError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

#[instrument(skip(state))]
pub async fn analyze_camera(
    State(state): State<SharedState>,
    request: Result<Json<AnalyzeCameraRequest>, JsonRejection>,
) -> Result<Response, AnalyzeError> {
    state.metrics.record_request("analyze_camera");
    let Json(request) = request?;
    let start = Instant::now();

    let result = state
        .analyze_service
        .analyze_camera(&request.entity_id)
        .await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let body = match result {
        Ok(AnalyzeOutcome::Updated { detections }) => {
            state.metrics.record_pipeline_run("updated", elapsed_ms);
            state.metrics.record_detections(detections as u64);
            json!({ "outcome": "updated", "detections": detections })
        }
        Ok(AnalyzeOutcome::Skipped(reason)) => {
            state.metrics.record_pipeline_run("skipped", elapsed_ms);
            json!({ "outcome": "skipped", "reason": reason.to_string() })
        }
        Err(e) => {
            state.metrics.record_pipeline_run("rejected", elapsed_ms);
            return Err(e.into());
        }
    };

    Ok(Json(body).into_response())
}
