use super::{base_attributes, Entity, EntityState, StateWriter, DOMAIN, STATE_UNAVAILABLE};
use crate::coordinator::{Coordinator, CoordinatorListener, DetectionSnapshot};
use bytes::Bytes;
use serde_json::Value;
use std::sync::Arc;

const STATE_IDLE: &str = "idle";

/// Serves the most recent annotated image.
pub struct AnnotatedCamera {
    coordinator: Arc<Coordinator>,
    writer: StateWriter,
}

impl AnnotatedCamera {
    pub fn new(coordinator: Arc<Coordinator>, writer: StateWriter) -> Self {
        Self {
            coordinator,
            writer,
        }
    }

    pub fn camera_image(&self) -> Option<Bytes> {
        self.coordinator.get_annotated_image()
    }

    pub fn available(&self) -> bool {
        self.available_in(&self.coordinator.snapshot())
    }
}

impl Entity for AnnotatedCamera {
    fn entity_id(&self) -> &'static str {
        "camera.object_detection_camera"
    }

    fn unique_id(&self) -> &'static str {
        "codeproject_alpr_annotated_camera"
    }

    fn name(&self) -> &'static str {
        "Object Detection Camera"
    }

    fn available_in(&self, snapshot: &DetectionSnapshot) -> bool {
        snapshot.has_image()
    }

    fn render(&self, snapshot: &DetectionSnapshot) -> EntityState {
        let mut attributes = base_attributes(self);
        attributes.insert("integration".into(), Value::from(DOMAIN));
        if let Some(camera) = &snapshot.source_camera {
            attributes.insert("source_camera".into(), Value::from(camera.as_str()));
        }

        let state = if self.available_in(snapshot) {
            STATE_IDLE
        } else {
            STATE_UNAVAILABLE
        };

        EntityState {
            entity_id: self.entity_id().to_string(),
            state: state.to_string(),
            attributes,
            last_updated: snapshot.updated_at,
        }
    }
}

impl CoordinatorListener for AnnotatedCamera {
    fn on_update(&self, snapshot: &DetectionSnapshot) {
        self.writer.write(self.render(snapshot));
    }
}
