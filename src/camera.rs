use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;

pub const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Camera returned status {0}")]
    Status(reqwest::StatusCode),
    #[error("Camera returned an empty image")]
    EmptyImage,
    #[error("{0}")]
    Unavailable(String),
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Entity ID {0} is not a valid camera entity ID")]
pub struct InvalidCameraEntity(pub String);

/// An entity id in the `camera` domain, e.g. `camera.front_door`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CameraEntityId(String);

impl CameraEntityId {
    pub fn parse(entity_id: &str) -> Result<Self, InvalidCameraEntity> {
        let invalid = || InvalidCameraEntity(entity_id.to_string());
        let (domain, object_id) = entity_id.split_once('.').ok_or_else(invalid)?;
        if domain != "camera" || !is_valid_slug(object_id) {
            return Err(invalid());
        }
        Ok(Self(entity_id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraEntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('_')
        && !slug.ends_with('_')
        && !slug.contains("__")
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

#[derive(Debug, Clone)]
pub struct CameraImage {
    pub content: Bytes,
    pub content_type: String,
}

#[async_trait]
pub trait CameraSource: Send + Sync {
    async fn capture(&self, camera: &CameraEntityId) -> Result<CameraImage, CaptureError>;
}
