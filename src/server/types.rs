use serde::{Deserialize, Serialize};

pub const HEALTH_MESSAGE: &str = "PDF Parsing Service is running";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: HEALTH_MESSAGE.to_string(),
        }
    }
}

/// Body of `POST /parse` after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    pub url: String,
}

impl ExtractionRequest {
    /// Accepts any body and keeps only a non-empty string `url`.
    /// Invalid JSON, non-objects and non-string urls all yield `None`.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        let url = value.get("url")?.as_str()?;
        if url.is_empty() {
            return None;
        }
        Some(Self {
            url: url.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExtractionResponse {
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorEnvelope {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
