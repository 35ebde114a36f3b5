//! Read-only entity views over the coordinator, in Home Assistant's state shape.

mod camera;
mod publisher;
mod sensor;

pub use camera::AnnotatedCamera;
pub use publisher::{publish_states, StatePublisher};
pub use sensor::DetectionSensor;

use crate::coordinator::{Coordinator, CoordinatorListener, DetectionSnapshot, ListenerId};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub const DOMAIN: &str = "codeproject_alpr";
pub const STATE_UNAVAILABLE: &str = "unavailable";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityState {
    pub entity_id: String,
    pub state: String,
    pub attributes: Map<String, Value>,
    pub last_updated: Option<DateTime<Utc>>,
}

pub trait Entity: Send + Sync {
    fn entity_id(&self) -> &'static str;
    fn unique_id(&self) -> &'static str;
    fn name(&self) -> &'static str;
    fn available_in(&self, snapshot: &DetectionSnapshot) -> bool;
    fn render(&self, snapshot: &DetectionSnapshot) -> EntityState;
}

/// Hands freshly rendered entity states to whoever publishes them.
#[derive(Clone, Default)]
pub struct StateWriter {
    tx: Option<UnboundedSender<EntityState>>,
}

impl StateWriter {
    pub fn channel() -> (Self, UnboundedReceiver<EntityState>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn write(&self, state: EntityState) {
        if let Some(tx) = &self.tx {
            if tx.send(state).is_err() {
                tracing::debug!("State receiver closed, dropping entity state");
            }
        }
    }
}

/// Both entities, registered as coordinator listeners for as long as this lives.
pub struct Entities {
    coordinator: Arc<Coordinator>,
    camera: Arc<AnnotatedCamera>,
    sensor: Arc<DetectionSensor>,
    listener_ids: Vec<ListenerId>,
}

impl Entities {
    pub fn register(coordinator: Arc<Coordinator>, writer: StateWriter) -> Self {
        let camera = Arc::new(AnnotatedCamera::new(coordinator.clone(), writer.clone()));
        let sensor = Arc::new(DetectionSensor::new(coordinator.clone(), writer));

        let camera_listener: Arc<dyn CoordinatorListener> = camera.clone();
        let sensor_listener: Arc<dyn CoordinatorListener> = sensor.clone();
        let listener_ids = vec![
            coordinator.add_listener(Arc::downgrade(&camera_listener)),
            coordinator.add_listener(Arc::downgrade(&sensor_listener)),
        ];

        let entities = Self {
            coordinator,
            camera,
            sensor,
            listener_ids,
        };
        for entity in entities.all() {
            tracing::debug!(
                entity_id = entity.entity_id(),
                unique_id = entity.unique_id(),
                "Registered entity"
            );
        }
        entities
    }

    pub fn camera(&self) -> &Arc<AnnotatedCamera> {
        &self.camera
    }

    pub fn sensor(&self) -> &Arc<DetectionSensor> {
        &self.sensor
    }

    pub fn get(&self, entity_id: &str) -> Option<&dyn Entity> {
        self.all().into_iter().find(|e| e.entity_id() == entity_id)
    }

    pub fn all(&self) -> Vec<&dyn Entity> {
        vec![
            self.camera.as_ref() as &dyn Entity,
            self.sensor.as_ref() as &dyn Entity,
        ]
    }

    pub fn snapshot(&self) -> Arc<DetectionSnapshot> {
        self.coordinator.snapshot()
    }

    pub fn state(&self, entity_id: &str) -> Option<EntityState> {
        self.get(entity_id)
            .map(|entity| entity.render(&self.coordinator.snapshot()))
    }

    pub fn states(&self) -> Vec<EntityState> {
        let snapshot = self.coordinator.snapshot();
        self.all().iter().map(|e| e.render(&snapshot)).collect()
    }
}

impl Drop for Entities {
    fn drop(&mut self) {
        for id in &self.listener_ids {
            self.coordinator.remove_listener(*id);
        }
    }
}

fn base_attributes(entity: &dyn Entity) -> Map<String, Value> {
    let mut attributes = Map::new();
    attributes.insert("friendly_name".into(), Value::from(entity.name()));
    attributes
}
