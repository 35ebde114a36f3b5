use crate::server::SharedState;
use axum::{extract::State, response::IntoResponse, response::Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
pub struct Status {
    status: String,
    last_update: Option<DateTime<Utc>>,
    source_camera: Option<String>,
}

pub async fn healthcheck(State(state): State<SharedState>) -> impl IntoResponse {
    let snapshot = state.entities.snapshot();

    Json(Status {
        status: "Available".into(),
        last_update: snapshot.updated_at,
        source_camera: snapshot.source_camera.clone(),
    })
}
