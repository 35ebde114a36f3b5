//! Home Assistant REST API client: camera snapshots in, entity states out.

use crate::{
    camera::{CameraEntityId, CameraImage, CameraSource, CaptureError, DEFAULT_CONTENT_TYPE},
    config::HomeAssistantConfig,
    entity::{EntityState, StatePublisher},
};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::json;
use std::time::Duration;
use tracing::instrument;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HomeAssistantClient {
    client: Client,
    base_url: String,
    access_token: String,
}

impl HomeAssistantClient {
    pub fn new(config: &HomeAssistantConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            client,
            base_url: config.url.as_str().trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl CameraSource for HomeAssistantClient {
    #[instrument(skip(self), fields(camera = %camera))]
    async fn capture(&self, camera: &CameraEntityId) -> Result<CameraImage, CaptureError> {
        let response = self
            .client
            .get(self.url(&format!("/api/camera_proxy/{}", camera)))
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CaptureError::Status(status));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let content = response.bytes().await?;
        if content.is_empty() {
            return Err(CaptureError::EmptyImage);
        }

        Ok(CameraImage {
            content,
            content_type,
        })
    }
}

#[async_trait]
impl StatePublisher for HomeAssistantClient {
    async fn publish(&self, state: &EntityState) -> anyhow::Result<()> {
        let response = self
            .client
            .post(self.url(&format!("/api/states/{}", state.entity_id)))
            .bearer_auth(&self.access_token)
            .json(&json!({
                "state": state.state,
                "attributes": state.attributes,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Home Assistant returned status {}", status);
        }
        Ok(())
    }
}
