//! Embeddings adapter

use super::error::{embedding_status_error, embedding_transport_error};
use super::settings::{EmbeddingEndpoint, EmbeddingEndpoints};
use super::types::{EmbeddingRequest, EmbeddingResponse};
use crate::knowledge::EmbedderFactory;
use async_trait::async_trait;
use kbchat_application::{Embedder, RetrievalError};
use kbchat_domain::EmbeddingModel;
use std::sync::Arc;
use tracing::debug;

/// Embeds text through an OpenAI-compatible `/embeddings` endpoint.
///
/// The API key is resolved at construction but only required when a
/// request is made, so an ungrounded session never needs one.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: EmbeddingEndpoint,
    api_key: Option<String>,
    model: EmbeddingModel,
}

impl OpenAiEmbedder {
    pub fn new(client: reqwest::Client, endpoint: EmbeddingEndpoint, model: EmbeddingModel) -> Self {
        let api_key = endpoint.resolve_api_key();
        Self {
            client,
            endpoint,
            api_key,
            model,
        }
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            RetrievalError::Unavailable(format!(
                "no API key for embedding model {}; set {}",
                self.model, self.endpoint.api_key_env
            ))
        })?;

        let body = EmbeddingRequest {
            model: self.endpoint.wire_model(&self.model),
            input: texts,
        };
        let response = self
            .client
            .post(self.endpoint.url())
            .bearer_auth(api_key)
            .timeout(self.endpoint.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| embedding_transport_error(e, self.endpoint.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(embedding_status_error(status, &text));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| embedding_transport_error(e, self.endpoint.timeout))?;
        if parsed.data.len() != texts.len() {
            return Err(RetrievalError::Unavailable(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model(&self) -> &EmbeddingModel {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
        self.request(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RetrievalError::Unavailable("empty embedding response".into()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        let batch_size = self.endpoint.batch_size.max(1);
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            vectors.extend(self.request(batch).await?);
        }
        debug!(model = %self.model, texts = texts.len(), "Embedded batch");
        Ok(vectors)
    }
}

/// Hands out [`OpenAiEmbedder`]s per embedding model.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    endpoints: EmbeddingEndpoints,
}

impl OpenAiEmbeddingProvider {
    pub fn new(endpoints: EmbeddingEndpoints) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoints,
        }
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }
}

impl EmbedderFactory for OpenAiEmbeddingProvider {
    fn create(&self, model: &EmbeddingModel) -> Result<Arc<dyn Embedder>, RetrievalError> {
        let endpoint = self.endpoints.for_model(model).clone();
        Ok(Arc::new(OpenAiEmbedder::new(
            self.client.clone(),
            endpoint,
            model.clone(),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_server::{serve, serve_once, CannedResponse};
    use super::*;

    fn endpoint(base_url: String, batch_size: usize) -> EmbeddingEndpoint {
        EmbeddingEndpoint {
            base_url,
            api_key: Some("sk-test".into()),
            batch_size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_embed_posts_model_and_input() {
        let (base_url, request) = serve_once(CannedResponse::json(
            200,
            r#"{"data":[{"embedding":[0.1,0.2],"index":0}]}"#,
        ))
        .await;
        let embedder = OpenAiEmbedder::new(
            reqwest::Client::new(),
            endpoint(base_url, 8),
            EmbeddingModel::TextEmbeddingAda002,
        );

        assert_eq!(embedder.embed("sky").await.unwrap(), vec![0.1, 0.2]);

        let request = request.await.unwrap();
        assert!(request.head.starts_with("POST /embeddings"));
        let body: serde_json::Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body["model"], "text-embedding-ada-002");
        assert_eq!(body["input"], serde_json::json!(["sky"]));
    }

    #[tokio::test]
    async fn test_batches_are_split_and_reordered_by_index() {
        let (base_url, requests) = serve(vec![
            CannedResponse::json(
                200,
                r#"{"data":[{"embedding":[2.0],"index":1},{"embedding":[1.0],"index":0}]}"#,
            ),
            CannedResponse::json(200, r#"{"data":[{"embedding":[3.0],"index":0}]}"#),
        ])
        .await;
        let embedder = OpenAiEmbedder::new(
            reqwest::Client::new(),
            endpoint(base_url, 2),
            EmbeddingModel::BgeLargeEn,
        );

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![2.0], vec![3.0]]);
        assert_eq!(requests.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_count_mismatch_is_unavailable() {
        let (base_url, _request) = serve_once(CannedResponse::json(200, r#"{"data":[]}"#)).await;
        let embedder = OpenAiEmbedder::new(
            reqwest::Client::new(),
            endpoint(base_url, 8),
            EmbeddingModel::default(),
        );
        assert!(matches!(
            embedder.embed("sky").await,
            Err(RetrievalError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_only_on_use() {
        let provider = OpenAiEmbeddingProvider::new(EmbeddingEndpoints {
            default: EmbeddingEndpoint {
                api_key_env: "KBCHAT_TEST_UNSET_KEY_VAR".into(),
                ..Default::default()
            },
            ..Default::default()
        });
        let embedder = provider.create(&EmbeddingModel::BgeLargeZh).unwrap();
        assert_eq!(embedder.model(), &EmbeddingModel::BgeLargeZh);
        let err = embedder.embed("sky").await.unwrap_err();
        assert!(matches!(err, RetrievalError::Unavailable(msg) if msg.contains("KBCHAT_TEST_UNSET_KEY_VAR")));
    }
}
