use super::{base_attributes, Entity, EntityState, StateWriter, STATE_UNAVAILABLE};
use crate::coordinator::{Coordinator, CoordinatorListener, DetectionSnapshot};
use serde_json::Value;
use std::sync::Arc;

const ATTR_OBJECTS: &str = "objects";
const ATTR_PLATES: &str = "plates";
const ATTR_SOURCE_CAMERA: &str = "source_camera";
const ATTR_LAST_UPDATE: &str = "last_update";

/// Number of objects found in the last analysed image.
pub struct DetectionSensor {
    coordinator: Arc<Coordinator>,
    writer: StateWriter,
}

impl DetectionSensor {
    pub fn new(coordinator: Arc<Coordinator>, writer: StateWriter) -> Self {
        Self {
            coordinator,
            writer,
        }
    }

    pub fn native_value(&self) -> usize {
        self.coordinator.get_predictions().len()
    }

    pub fn available(&self) -> bool {
        self.available_in(&self.coordinator.snapshot())
    }
}

impl Entity for DetectionSensor {
    fn entity_id(&self) -> &'static str {
        "sensor.object_detection"
    }

    fn unique_id(&self) -> &'static str {
        "codeproject_alpr_detected_objects"
    }

    fn name(&self) -> &'static str {
        "Object Detection"
    }

    fn available_in(&self, snapshot: &DetectionSnapshot) -> bool {
        snapshot.has_data()
    }

    fn render(&self, snapshot: &DetectionSnapshot) -> EntityState {
        let mut attributes = base_attributes(self);
        attributes.insert("icon".into(), Value::from("mdi:image-search"));
        attributes.insert(
            ATTR_OBJECTS.into(),
            serde_json::to_value(&snapshot.predictions).unwrap_or_default(),
        );
        attributes.insert(
            ATTR_SOURCE_CAMERA.into(),
            snapshot
                .source_camera
                .as_deref()
                .map_or(Value::Null, Value::from),
        );
        if let Some(updated_at) = snapshot.updated_at {
            attributes.insert(ATTR_LAST_UPDATE.into(), Value::from(updated_at.to_rfc3339()));
        }

        let plates: Vec<&str> = snapshot
            .predictions
            .iter()
            .filter_map(|p| p.plate.as_deref())
            .collect();
        if !plates.is_empty() {
            attributes.insert(ATTR_PLATES.into(), Value::from(plates));
        }

        let state = if self.available_in(snapshot) {
            snapshot.predictions.len().to_string()
        } else {
            STATE_UNAVAILABLE.to_string()
        };

        EntityState {
            entity_id: self.entity_id().to_string(),
            state,
            attributes,
            last_updated: snapshot.updated_at,
        }
    }
}

impl CoordinatorListener for DetectionSensor {
    fn on_update(&self, snapshot: &DetectionSnapshot) {
        self.writer.write(self.render(snapshot));
    }
}
