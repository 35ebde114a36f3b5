//! Holds the latest detection result and tells registered listeners when it changes.

use crate::prediction::Prediction;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

/// The complete result of one pipeline run. Always replaced as a whole.
#[derive(Debug, Clone, Default)]
pub struct DetectionSnapshot {
    pub annotated_image: Option<Bytes>,
    pub predictions: Vec<Prediction>,
    pub updated_at: Option<DateTime<Utc>>,
    pub source_camera: Option<String>,
}

impl DetectionSnapshot {
    pub fn has_image(&self) -> bool {
        self.annotated_image.is_some()
    }

    pub fn has_data(&self) -> bool {
        self.updated_at.is_some()
    }
}

pub trait CoordinatorListener: Send + Sync {
    fn on_update(&self, snapshot: &DetectionSnapshot);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct Coordinator {
    snapshot: RwLock<Arc<DetectionSnapshot>>,
    listeners: Mutex<Vec<(ListenerId, Weak<dyn CoordinatorListener>)>>,
    // Serializes replace-and-notify so listeners see updates in commit order.
    update_lock: Mutex<()>,
    next_listener_id: AtomicU64,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(DetectionSnapshot::default())),
            listeners: Mutex::new(Vec::new()),
            update_lock: Mutex::new(()),
            next_listener_id: AtomicU64::new(1),
        }
    }

    pub fn update(
        &self,
        image_bytes: Option<Bytes>,
        predictions: Vec<Prediction>,
        source_camera: &str,
    ) {
        let _guard = self.update_lock.lock();

        let snapshot = Arc::new(DetectionSnapshot {
            annotated_image: image_bytes,
            predictions,
            updated_at: Some(Utc::now()),
            source_camera: Some(source_camera.to_string()),
        });
        *self.snapshot.write() = snapshot.clone();

        tracing::debug!(
            source_camera,
            detections = snapshot.predictions.len(),
            "Coordinator snapshot replaced"
        );

        for listener in self.live_listeners() {
            listener.on_update(&snapshot);
        }
    }

    pub fn snapshot(&self) -> Arc<DetectionSnapshot> {
        self.snapshot.read().clone()
    }

    pub fn get_annotated_image(&self) -> Option<Bytes> {
        self.snapshot.read().annotated_image.clone()
    }

    pub fn get_predictions(&self) -> Vec<Prediction> {
        self.snapshot.read().predictions.clone()
    }

    pub fn add_listener(&self, listener: Weak<dyn CoordinatorListener>) -> ListenerId {
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        let mut listeners = self.listeners.lock();
        listeners.retain(|(_, listener)| listener.strong_count() > 0);
        listeners.len()
    }

    // Upgraded outside the listener lock so a callback may (un)register listeners.
    fn live_listeners(&self) -> Vec<Arc<dyn CoordinatorListener>> {
        let mut listeners = self.listeners.lock();
        listeners.retain(|(_, listener)| listener.strong_count() > 0);
        listeners
            .iter()
            .filter_map(|(_, listener)| listener.upgrade())
            .collect()
    }
}
