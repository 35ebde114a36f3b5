use crate::{camera::CameraImage, config::DetectionConfig, prediction::Prediction};
use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, StatusCode,
};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::instrument;

const UPLOAD_FILE_NAME: &str = "snapshot.jpg";

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Failed to reach detection service: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Detection service returned status {0}")]
    Status(StatusCode),
    #[error("Malformed detection response: {0}")]
    MalformedBody(String),
    #[error("Detection failed: {0}")]
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct DetectionResponse {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    predictions: Option<Vec<Prediction>>,
    #[serde(default)]
    error: Option<String>,
}

impl DetectionResponse {
    fn into_predictions(self) -> Result<Vec<Prediction>, DetectionError> {
        if self.success != Some(true) {
            return Err(DetectionError::Rejected(
                self.error.unwrap_or_else(|| "Unknown error".to_string()),
            ));
        }
        Ok(self.predictions.unwrap_or_default())
    }
}

#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, image: &CameraImage) -> Result<Vec<Prediction>, DetectionError>;
}

pub struct HttpDetector {
    client: Client,
    endpoint: String,
    min_confidence: f64,
}

impl HttpDetector {
    pub fn new(config: &DetectionConfig) -> Result<Self, DetectionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.get_endpoint(),
            min_confidence: config.min_confidence,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_form(&self, image: &CameraImage) -> Result<Form, DetectionError> {
        let upload = Part::bytes(image.content.to_vec())
            .file_name(UPLOAD_FILE_NAME)
            .mime_str(&image.content_type)?;

        Ok(Form::new()
            .part("upload", upload)
            .text("min_confidence", self.min_confidence.to_string()))
    }
}

#[async_trait]
impl Detector for HttpDetector {
    #[instrument(skip(self, image), fields(endpoint = %self.endpoint, bytes = image.content.len()))]
    async fn detect(&self, image: &CameraImage) -> Result<Vec<Prediction>, DetectionError> {
        let form = self.build_form(image)?;
        let response = self.client.post(&self.endpoint).multipart(form).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(DetectionError::Status(status));
        }

        let body = response.bytes().await?;
        let parsed: DetectionResponse = serde_json::from_slice(&body)
            .map_err(|e| DetectionError::MalformedBody(e.to_string()))?;
        tracing::debug!("Detection response: {}", String::from_utf8_lossy(&body));

        parsed.into_predictions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionMode;
    use axum::{
        http::{header, HeaderMap, StatusCode as AxumStatus},
        routing::post,
        Router,
    };
    use bytes::Bytes;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn detector(server_url: &str, mode: DetectionMode) -> HttpDetector {
        HttpDetector::new(&DetectionConfig {
            server_url: server_url.parse().unwrap(),
            timeout: 5,
            min_confidence: 0.4,
            mode,
        })
        .unwrap()
    }

    fn image() -> CameraImage {
        CameraImage {
            content: Bytes::from_static(b"\xff\xd8jpeg-bytes\xff\xd9"),
            content_type: "image/jpeg".to_string(),
        }
    }

    #[tokio::test]
    async fn test_detect_sends_multipart_and_parses_predictions() {
        let router = Router::new().route(
            "/v1/vision/detection",
            post(|headers: HeaderMap, body: Bytes| async move {
                let content_type = headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                let body = String::from_utf8_lossy(&body).to_string();
                let well_formed = content_type.starts_with("multipart/form-data")
                    && body.contains("name=\"upload\"; filename=\"snapshot.jpg\"")
                    && body.contains("jpeg-bytes")
                    && body.contains("name=\"min_confidence\"")
                    && body.contains("0.4");
                if !well_formed {
                    return (AxumStatus::BAD_REQUEST, String::new());
                }
                (
                    AxumStatus::OK,
                    r#"{"success": true, "predictions": [
                        {"x_min": 10, "y_min": 10, "x_max": 50, "y_max": 50, "label": "car", "confidence": 0.9},
                        {"x_min": 60, "y_min": 5, "x_max": 90, "y_max": 40, "label": "person", "confidence": 0.3}
                    ]}"#
                    .to_string(),
                )
            }),
        );
        let url = serve(router).await;

        let predictions = detector(&url, DetectionMode::Objects)
            .detect(&image())
            .await
            .unwrap();

        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0].label, "car");
        assert_eq!(predictions[0].x_max, 50.0);
        assert_eq!(predictions[1].confidence, 0.3);
    }

    #[tokio::test]
    async fn test_plate_mode_keeps_plate_text() {
        let router = Router::new().route(
            "/v1/vision/alpr",
            post(|| async {
                r#"{"success": true, "predictions": [
                    {"x_min": 1, "y_min": 2, "x_max": 3, "y_max": 4, "label": "Plate: ABC123", "plate": "ABC123", "confidence": 0.8}
                ]}"#
            }),
        );
        let url = serve(router).await;

        let predictions = detector(&url, DetectionMode::Plates)
            .detect(&image())
            .await
            .unwrap();

        assert_eq!(predictions[0].plate.as_deref(), Some("ABC123"));
    }

    #[tokio::test]
    async fn test_non_200_status_is_an_error() {
        let router = Router::new().route(
            "/v1/vision/detection",
            post(|| async { (AxumStatus::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let url = serve(router).await;

        let err = detector(&url, DetectionMode::Objects)
            .detect(&image())
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionError::Status(s) if s == StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn test_unsuccessful_response_reports_error() {
        let router = Router::new().route(
            "/v1/vision/detection",
            post(|| async { r#"{"success": false, "error": "No model loaded"}"# }),
        );
        let url = serve(router).await;

        let err = detector(&url, DetectionMode::Objects)
            .detect(&image())
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionError::Rejected(ref msg) if msg == "No model loaded"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_an_error() {
        let router = Router::new().route(
            "/v1/vision/detection",
            post(|| async { "<html>not json</html>" }),
        );
        let url = serve(router).await;

        let err = detector(&url, DetectionMode::Objects)
            .detect(&image())
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionError::MalformedBody(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);

        let err = detector(&url, DetectionMode::Objects)
            .detect(&image())
            .await
            .unwrap_err();

        assert!(matches!(err, DetectionError::Request(_)));
    }

    #[tokio::test]
    async fn test_slow_server_times_out() {
        let router = Router::new().route(
            "/v1/vision/detection",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                r#"{"success": true, "predictions": []}"#
            }),
        );
        let url = serve(router).await;
        let detector = HttpDetector::new(&DetectionConfig {
            server_url: url.parse().unwrap(),
            timeout: 1,
            min_confidence: 0.4,
            mode: DetectionMode::Objects,
        })
        .unwrap();

        let err = detector.detect(&image()).await.unwrap_err();

        assert!(matches!(err, DetectionError::Request(ref e) if e.is_timeout()));
    }

    #[test]
    fn test_null_values_do_not_drop_the_result() {
        let response: DetectionResponse = serde_json::from_str(
            r#"{"success": true, "predictions": [
                {"x_min": 1, "y_min": 2, "x_max": 30, "y_max": 40, "label": null, "confidence": null}
            ]}"#,
        )
        .unwrap();
        let predictions = response.into_predictions().unwrap();

        assert_eq!(predictions.len(), 1);
        assert_eq!(predictions[0].label, "unknown");
        assert_eq!(predictions[0].confidence, 0.0);

        let response: DetectionResponse =
            serde_json::from_str(r#"{"success": true, "predictions": null}"#).unwrap();
        assert!(response.into_predictions().unwrap().is_empty());
    }

    #[test]
    fn test_missing_success_flag_is_rejected() {
        let response: DetectionResponse = serde_json::from_str(r#"{"predictions": []}"#).unwrap();

        let err = response.into_predictions().unwrap_err();
        assert!(matches!(err, DetectionError::Rejected(ref msg) if msg == "Unknown error"));
    }
}
