use async_trait::async_trait;

use crate::config::EmbeddingsConfig;
use crate::error::{ProbsimError, Result};

use super::api::EmbeddingApiClient;

/// E5-style role for the text being embedded: stored problem content is a
/// `passage`, search input is a `query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedRole {
    Passage,
    Query,
}

impl EmbedRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmbedRole::Passage => "passage",
            EmbedRole::Query => "query",
        }
    }
}

/// Injectable capability for turning text into vectors. The production
/// implementation talks to the embedding service over HTTP; tests substitute
/// a fake.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vec<f32>>>;
    fn dimensions(&self) -> usize;
}

pub struct HttpEmbeddingProvider {
    client: EmbeddingApiClient,
    dimensions: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(config: &EmbeddingsConfig) -> Result<Self> {
        Ok(Self {
            client: EmbeddingApiClient::new(config)?,
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.client.embed(texts, role.as_str()).await?;

        for vector in &vectors {
            if vector.len() != self.dimensions {
                return Err(ProbsimError::Embedding(format!(
                    "Embedding service returned {}-dimensional vector, expected {}",
                    vector.len(),
                    self.dimensions
                )));
            }
        }

        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String, dimensions: usize) -> EmbeddingsConfig {
        EmbeddingsConfig {
            base_url,
            timeout_secs: 5,
            dimensions,
        }
    }

    #[tokio::test]
    async fn test_rejects_wrong_dimensionality() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "vectors": [[0.1, 0.2]] })),
            )
            .mount(&server)
            .await;

        let provider = HttpEmbeddingProvider::new(&test_config(server.uri(), 4)).unwrap();
        let result = provider
            .embed(&["text".to_string()], EmbedRole::Passage)
            .await;
        assert!(matches!(result, Err(ProbsimError::Embedding(_))));
    }

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        // No mock mounted: a request would fail the test with a connect error.
        let provider =
            HttpEmbeddingProvider::new(&test_config("http://127.0.0.1:9".to_string(), 4)).unwrap();
        let vectors = provider.embed(&[], EmbedRole::Passage).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[test]
    fn test_role_strings() {
        assert_eq!(EmbedRole::Passage.as_str(), "passage");
        assert_eq!(EmbedRole::Query.as_str(), "query");
    }
}
