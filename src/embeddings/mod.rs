// Embeddings module
// HTTP client for an Ollama-compatible embedding endpoint. One outbound call
// per embed; retry policy belongs to the caller, never to this client.


use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::EmbeddingConfig;

const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Embedding backend unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    base_url: Url,
    model: String,
    agent: ureq::Agent,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ModelInfo {
    pub name: String,
}

impl EmbeddingClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let base_url = config
            .base_url()
            .map_err(|e| EmbeddingError::InvalidInput(format!("Invalid embedding URL: {e}")))?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(DEFAULT_TIMEOUT_SECONDS)))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.model.clone(),
            agent,
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check that the embedding server is reachable.
    #[inline]
    pub fn ping(&self) -> Result<(), EmbeddingError> {
        let url = self
            .base_url
            .join("/api/tags")
            .map_err(|e| EmbeddingError::InvalidInput(format!("Failed to build ping URL: {e}")))?;

        debug!("Pinging embedding server at {}", url);

        self.agent
            .get(url.as_str())
            .call()
            .map_err(classify_transport_error)?;

        Ok(())
    }

    /// Check that the configured model is served by the backend.
    #[inline]
    pub fn validate_model(&self) -> Result<(), EmbeddingError> {
        let url = self.base_url.join("/api/tags").map_err(|e| {
            EmbeddingError::InvalidInput(format!("Failed to build models URL: {e}"))
        })?;

        let body = self
            .agent
            .get(url.as_str())
            .call()
            .map_err(classify_transport_error)?
            .body_mut()
            .read_to_string()
            .map_err(|e| EmbeddingError::Unavailable(format!("Failed to read response: {e}")))?;

        let models: ModelsResponse = serde_json::from_str(&body)
            .map_err(|e| EmbeddingError::Unavailable(format!("Malformed models response: {e}")))?;

        if models.models.iter().any(|m| m.name == self.model) {
            Ok(())
        } else {
            Err(EmbeddingError::Unavailable(format!(
                "Model '{}' is not available on the embedding server",
                self.model
            )))
        }
    }

    /// Embed a single text into a fixed-length vector.
    ///
    /// Makes exactly one outbound call. Unavailability (rate limit, auth,
    /// network) surfaces as `EmbeddingError::Unavailable` with no retry.
    #[inline]
    pub fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.trim().is_empty() {
            return Err(EmbeddingError::InvalidInput(
                "cannot embed empty text".to_string(),
            ));
        }

        debug!("Generating embedding for text (length: {})", text.len());

        let url = self.base_url.join("/api/embed").map_err(|e| {
            EmbeddingError::InvalidInput(format!("Failed to build embedding URL: {e}"))
        })?;

        let request = EmbedRequest {
            model: &self.model,
            prompt: text,
        };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| EmbeddingError::InvalidInput(format!("Failed to serialize request: {e}")))?;

        let body = self
            .agent
            .post(url.as_str())
            .header("Content-Type", "application/json")
            .send(&request_json)
            .map_err(classify_transport_error)?
            .body_mut()
            .read_to_string()
            .map_err(|e| EmbeddingError::Unavailable(format!("Failed to read response: {e}")))?;

        let response: EmbedResponse = serde_json::from_str(&body).map_err(|e| {
            EmbeddingError::Unavailable(format!("Malformed embedding response: {e}"))
        })?;

        if response.embedding.is_empty() {
            return Err(EmbeddingError::Unavailable(
                "Embedding server returned an empty vector".to_string(),
            ));
        }

        debug!(
            "Generated embedding with {} dimensions",
            response.embedding.len()
        );
        Ok(response.embedding)
    }
}

fn classify_transport_error(error: ureq::Error) -> EmbeddingError {
    match error {
        ureq::Error::StatusCode(status) => {
            EmbeddingError::Unavailable(format!("Embedding server returned HTTP {status}"))
        }
        other => EmbeddingError::Unavailable(format!("Transport error: {other}")),
    }
}
