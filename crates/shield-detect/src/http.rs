//! HTTP inference client.
//!
//! Each [`HttpDetector`] serves one detector slot by posting the JPEG encoded
//! frame to `{base_url}/detect/{kind}` on a model-serving process.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio::runtime::Handle;
use tracing::{debug, warn};

use shield_media::encode_jpeg;
use shield_models::{Detection, DetectorKind, Frame};

use crate::detector::Detector;
use crate::error::{DetectResult, DetectorError};
use crate::types::{DetectResponse, HealthResponse};

/// Configuration for the inference client.
#[derive(Debug, Clone)]
pub struct HttpDetectorConfig {
    /// Base URL of the inference service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// JPEG quality of the uploaded frame
    pub jpeg_quality: u8,
}

impl Default for HttpDetectorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8003".to_string(),
            timeout: Duration::from_secs(5),
            jpeg_quality: 85,
        }
    }
}

impl HttpDetectorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("DETECTOR_URL")
                .unwrap_or_else(|_| "http://localhost:8003".to_string()),
            timeout: Duration::from_millis(
                std::env::var("DETECTOR_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
            ),
            jpeg_quality: std::env::var("DETECTOR_JPEG_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(85),
        }
    }
}

/// Detector backed by a remote inference service.
pub struct HttpDetector {
    http: Client,
    config: HttpDetectorConfig,
    kind: DetectorKind,
    runtime: Handle,
}

impl HttpDetector {
    /// Create a detector for `kind`.
    ///
    /// Must be called from within a Tokio runtime; blocking calls to
    /// [`Detector::detect`] are driven on that runtime.
    pub fn new(kind: DetectorKind, config: HttpDetectorConfig) -> DetectResult<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| DetectorError::failed(format!("no async runtime: {}", e)))?;
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(DetectorError::Network)?;

        Ok(Self {
            http,
            config,
            kind,
            runtime,
        })
    }

    fn detect_url(&self) -> String {
        format!(
            "{}/detect/{}",
            self.config.base_url.trim_end_matches('/'),
            self.kind
        )
    }

    /// Check if the inference service is healthy.
    pub async fn health_check(&self) -> DetectResult<bool> {
        let url = format!("{}/health", self.config.base_url.trim_end_matches('/'));

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Inference service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Inference service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Run inference on one frame.
    pub async fn request(&self, frame: &Frame, confidence_threshold: f32) -> DetectResult<Vec<Detection>> {
        let body = encode_jpeg(frame, self.config.jpeg_quality)
            .map_err(|e| DetectorError::failed(format!("cannot encode frame: {}", e)))?;
        let url = self.detect_url();

        debug!(detector = %self.kind, frame = frame.seq(), "Sending inference request to {}", url);

        let response = self
            .http
            .post(&url)
            .query(&[("conf_threshold", confidence_threshold)])
            .header(CONTENT_TYPE, "image/jpeg")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DetectorError::RequestFailed(format!(
                "inference service returned {}: {}",
                status, body
            )));
        }

        let text = response.text().await?;
        let parsed: DetectResponse = serde_json::from_str(&text)
            .map_err(|e| DetectorError::InvalidResponse(format!("{}: {}", e, text)))?;

        Ok(parsed
            .detections
            .into_iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .collect())
    }
}

impl Detector for HttpDetector {
    fn detect(&self, frame: &Frame, confidence_threshold: f32) -> DetectResult<Vec<Detection>> {
        self.runtime.block_on(self.request(frame, confidence_threshold))
    }
}
