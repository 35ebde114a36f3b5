use crate::{
    annotator::Annotator,
    camera::{CameraEntityId, CameraSource, CaptureError, InvalidCameraEntity},
    coordinator::Coordinator,
    detection::{DetectionError, Detector},
    prediction::Prediction,
};
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

/// Caller-correctable failures of `analyze_camera`.
#[derive(Error, Debug)]
pub enum ServiceValidationError {
    #[error(transparent)]
    InvalidEntity(#[from] InvalidCameraEntity),
    #[error("Failed to capture image from {camera}: {source}")]
    Capture {
        camera: CameraEntityId,
        #[source]
        source: CaptureError,
    },
}

#[derive(Debug)]
pub enum AnalyzeOutcome {
    Updated { detections: usize },
    /// Detection did not produce a result; the coordinator was left untouched.
    Skipped(DetectionError),
}

pub struct AnalyzeService {
    camera_source: Arc<dyn CameraSource>,
    detector: Arc<dyn Detector>,
    annotator: Arc<Annotator>,
    coordinator: Arc<Coordinator>,
}

impl AnalyzeService {
    pub fn new(
        camera_source: Arc<dyn CameraSource>,
        detector: Arc<dyn Detector>,
        annotator: Arc<Annotator>,
        coordinator: Arc<Coordinator>,
    ) -> Self {
        Self {
            camera_source,
            detector,
            annotator,
            coordinator,
        }
    }

    #[instrument(skip(self))]
    pub async fn analyze_camera(
        &self,
        entity_id: &str,
    ) -> Result<AnalyzeOutcome, ServiceValidationError> {
        let camera = CameraEntityId::parse(entity_id)?;
        tracing::debug!("Analyzing camera {} for objects", camera);

        let image = match self.camera_source.capture(&camera).await {
            Ok(image) => image,
            Err(source) => {
                tracing::error!("Failed to capture image from {}: {}", camera, source);
                return Err(ServiceValidationError::Capture { camera, source });
            }
        };
        tracing::info!(
            "Captured image from {}: {} bytes, content_type={}",
            camera,
            image.content.len(),
            image.content_type
        );

        let predictions = match self.detector.detect(&image).await {
            Ok(predictions) => predictions,
            Err(e) => {
                match &e {
                    DetectionError::Rejected(msg) => {
                        tracing::warn!("Object detection failed: {}", msg)
                    }
                    other => tracing::error!("Detection request for {} failed: {}", camera, other),
                }
                return Ok(AnalyzeOutcome::Skipped(e));
            }
        };
        tracing::info!("Detected {} object(s)", predictions.len());

        let annotated = self.annotate(image.content, &predictions).await;

        let detections = predictions.len();
        self.coordinator
            .update(Some(annotated), predictions, camera.as_str());
        tracing::debug!("Successfully updated detection data for {}", camera);

        Ok(AnalyzeOutcome::Updated { detections })
    }

    async fn annotate(&self, image: Bytes, predictions: &[Prediction]) -> Bytes {
        if predictions.is_empty() {
            return image;
        }

        let annotator = self.annotator.clone();
        let owned = predictions.to_vec();
        let original = image.clone();
        match tokio::task::spawn_blocking(move || annotator.annotate_or_original(image, &owned))
            .await
        {
            Ok(annotated) => annotated,
            Err(e) => {
                tracing::warn!("Annotation task failed: {}", e);
                original
            }
        }
    }
}
