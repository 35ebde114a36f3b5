use super::EntityState;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc::UnboundedReceiver};

#[async_trait]
pub trait StatePublisher: Send + Sync {
    async fn publish(&self, state: &EntityState) -> anyhow::Result<()>;
}

/// Drains entity state writes until shutdown, forwarding them when a publisher is set.
pub async fn publish_states(
    mut rx: UnboundedReceiver<EntityState>,
    publisher: Option<Arc<dyn StatePublisher>>,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            state = rx.recv() => {
                let Some(state) = state else { break };
                tracing::info!(
                    entity_id = %state.entity_id,
                    state = %state.state,
                    "Entity state changed"
                );
                if let Some(publisher) = &publisher {
                    if let Err(e) = publisher.publish(&state).await {
                        tracing::error!("Failed to publish state of {}: {:?}", state.entity_id, e);
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                tracing::info!("State publisher received shutdown signal");
                break;
            }
        }
    }
    tracing::info!("State publisher stopped");
}
