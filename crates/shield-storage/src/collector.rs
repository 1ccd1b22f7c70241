//! Delivery of clips to the incident collector.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tracing::{debug, info};

use shield_models::ClipArtifact;

use crate::error::{StorageError, StorageResult};

/// Something that can deliver a finished clip.
#[async_trait]
pub trait ClipTransport: Send + Sync {
    /// Deliver one clip. Resolves once the remote end has accepted or
    /// rejected it.
    async fn deliver(&self, artifact: &ClipArtifact) -> StorageResult<()>;
}

/// Configuration for the collector client.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Endpoint receiving multipart uploads
    pub url: String,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8001/agent".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl CollectorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("AGENT_URL")
                .unwrap_or_else(|_| "http://localhost:8001/agent".to_string()),
            timeout: Duration::from_secs(
                std::env::var("UPLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

/// Multipart HTTP client for the incident collector.
///
/// Each clip is sent as a `file` part (`video/mp4`) alongside the
/// `camera_id`, `latitude`, `longitude` and `event_type` text fields.
#[derive(Clone)]
pub struct CollectorClient {
    http: Client,
    config: CollectorConfig,
}

impl CollectorClient {
    pub fn new(config: CollectorConfig) -> StorageResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::config_error(e.to_string()))?;

        Ok(Self { http, config })
    }

    async fn form(&self, artifact: &ClipArtifact) -> StorageResult<Form> {
        let bytes = tokio::fs::read(artifact.path()).await?;
        let size = bytes.len();
        let file = Part::bytes(bytes)
            .file_name(artifact.file_name())
            .mime_str("video/mp4")?;

        let metadata = &artifact.metadata;
        debug!(
            "Prepared {} ({} bytes) for upload",
            artifact.path().display(),
            size
        );

        Ok(Form::new()
            .part("file", file)
            .text("camera_id", metadata.camera_id.clone())
            .text("latitude", metadata.location.latitude.to_string())
            .text("longitude", metadata.location.longitude.to_string())
            .text("event_type", metadata.event_type.to_string()))
    }
}

#[async_trait]
impl ClipTransport for CollectorClient {
    async fn deliver(&self, artifact: &ClipArtifact) -> StorageResult<()> {
        let form = self.form(artifact).await?;

        let response = self
            .http
            .post(&self.config.url)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Rejected { status, body });
        }

        info!(
            "Delivered {} event clip {} to {}",
            artifact.metadata.event_type,
            artifact.file_name(),
            self.config.url
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shield_models::{ClipMetadata, EventType, GeoLocation};
    use wiremock::matchers::{body_string_contains, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn artifact(dir: &std::path::Path) -> ClipArtifact {
        let metadata = ClipMetadata::new(
            EventType::Violence,
            "gate-3",
            GeoLocation::new(12.5, -7.25),
            Utc::now(),
        );
        let path = dir.join(metadata.file_name());
        tokio::fs::write(&path, b"fake-mp4-bytes").await.unwrap();
        ClipArtifact::new(path, metadata)
    }

    fn client(server: &MockServer) -> CollectorClient {
        CollectorClient::new(CollectorConfig {
            url: format!("{}/agent", server.uri()),
            timeout: Duration::from_secs(2),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_deliver_sends_multipart_fields() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent"))
            .and(header_exists("content-type"))
            .and(body_string_contains("name=\"file\""))
            .and(body_string_contains("video/mp4"))
            .and(body_string_contains("fake-mp4-bytes"))
            .and(body_string_contains("gate-3"))
            .and(body_string_contains("12.5"))
            .and(body_string_contains("-7.25"))
            .and(body_string_contains("Violence"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        client(&server).deliver(&artifact(tmp.path()).await).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_upload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("disk full"))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let err = client(&server)
            .deliver(&artifact(tmp.path()).await)
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Rejected { status: 500, ref body } if body == "disk full"));
        assert_eq!(err.kind(), "rejected");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let server = MockServer::start().await;
        let metadata = ClipMetadata::new(EventType::Fire, "cam1", GeoLocation::default(), Utc::now());
        let artifact = ClipArtifact::new("/nonexistent/Fire.mp4", metadata);

        let err = client(&server).deliver(&artifact).await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
    }
}
