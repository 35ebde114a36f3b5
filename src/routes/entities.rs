use crate::{
    entity::{Entity, EntityState},
    server::SharedState,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EntityLookupError {
    #[error("Entity {0} not found")]
    NotFound(String),
    #[error("Entity {0} is unavailable")]
    Unavailable(String),
}

impl IntoResponse for EntityLookupError {
    fn into_response(self) -> Response {
        let status = match self {
            EntityLookupError::NotFound(_) => StatusCode::NOT_FOUND,
            EntityLookupError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        (status, self.to_string()).into_response()
    }
}

pub async fn list_states(State(state): State<SharedState>) -> Json<Vec<EntityState>> {
    state.metrics.record_request("states");
    Json(state.entities.states())
}

pub async fn get_state(
    State(state): State<SharedState>,
    Path(entity_id): Path<String>,
) -> Result<Json<EntityState>, EntityLookupError> {
    state.metrics.record_request("state");
    state
        .entities
        .state(&entity_id)
        .map(Json)
        .ok_or(EntityLookupError::NotFound(entity_id))
}

pub async fn camera_proxy(
    State(state): State<SharedState>,
    Path(entity_id): Path<String>,
) -> Result<Response, EntityLookupError> {
    state.metrics.record_request("camera_proxy");
    let camera = state.entities.camera();
    if entity_id != camera.entity_id() {
        return Err(EntityLookupError::NotFound(entity_id));
    }

    let image = camera
        .camera_image()
        .ok_or(EntityLookupError::Unavailable(entity_id))?;

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], image).into_response())
}
