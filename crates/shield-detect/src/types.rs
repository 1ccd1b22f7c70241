//! Wire types of the inference service.

use serde::{Deserialize, Serialize};

use shield_models::Detection;

/// Response of `POST /detect/{kind}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectResponse {
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
}
