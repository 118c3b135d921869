//! OpenAI embeddings client.

use quorum_core::config::OpenAiConfig;
use quorum_core::{Error, Result};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

pub struct EmbeddingsClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

impl EmbeddingsClient {
    /// Build a client from config. Fails fast when no API key is set.
    pub fn from_config(config: &OpenAiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::Unconfigured("OpenAI API key".into()))?;

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|e| Error::Upstream(e.to_string()))?,
            base_url: config.base_url.clone(),
            api_key,
            model: config.embedding_model.clone(),
        })
    }

    /// Get an embedding vector for one piece of text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(model = %self.model, len = text.len(), "Embedding text");

        let response = self
            .client
            .post(format!("{}/v1/embeddings", self.base_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&json!({ "model": self.model, "input": text }))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("embeddings request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("embeddings API {status}: {body}")));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("embeddings response parse: {e}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|e| e.embedding)
            .ok_or_else(|| Error::Upstream("embeddings API returned no data".into()))
    }
}
