use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::EmbeddingsConfig;
use crate::error::{ProbsimError, Result};

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    texts: &'a [String],
    role: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub model_name: String,
}

/// Client for the embedding service's HTTP API.
///
/// One request per call, no internal retry: a failed call surfaces to the
/// caller and retry/skip is decided at the batch level.
#[derive(Clone)]
pub struct EmbeddingApiClient {
    client: Client,
    base_url: String,
}

impl EmbeddingApiClient {
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProbsimError::Embedding(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn embed(&self, texts: &[String], role: &str) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/embed", self.base_url);
        let request = EmbedRequest { texts, role };

        let response = self.client.post(&url).json(&request).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProbsimError::Embedding(format!(
                "Embedding service returned {status}: {body}"
            )));
        }

        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| ProbsimError::Embedding(format!("Failed to parse response: {e}")))?;

        if body.vectors.len() != texts.len() {
            return Err(ProbsimError::Embedding(format!(
                "Embedding service returned {} vectors for {} texts",
                body.vectors.len(),
                texts.len()
            )));
        }

        Ok(body.vectors)
    }

    pub async fn health(&self) -> Result<HealthStatus> {
        let url = format!("{}/health", self.base_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProbsimError::Embedding(format!(
                "Health check returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProbsimError::Embedding(format!("Failed to parse health response: {e}")))
    }
}
