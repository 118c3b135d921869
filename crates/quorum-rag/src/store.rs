//! Supabase vector store client (PostgREST + RPC).
//!
//! Tables: `sources` (one row per ingested document) and `embeddings`
//! (one row per chunk). Similarity search goes through the
//! `match_embeddings` RPC so pgvector does the ranking server-side.

use quorum_core::config::SupabaseConfig;
use quorum_core::types::SearchHit;
use quorum_core::{Error, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

pub struct VectorStore {
    client: reqwest::Client,
    rest_url: String,
    service_key: String,
}

#[derive(Debug, Deserialize)]
struct MatchRow {
    text: String,
    timestamp: String,
    session_info: String,
    similarity: f64,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    id: String,
}

impl VectorStore {
    /// Build a store client from config. Fails fast when Supabase
    /// credentials are missing.
    pub fn from_config(config: Option<&SupabaseConfig>) -> Result<Self> {
        let config = config.ok_or_else(|| Error::Unconfigured("Supabase".into()))?;

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|e| Error::Upstream(e.to_string()))?,
            rest_url: format!("{}/rest/v1", config.url.trim_end_matches('/')),
            service_key: config.service_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{path}", self.rest_url))
            .header("apikey", &self.service_key)
            .header("authorization", format!("Bearer {}", self.service_key))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(Error::Upstream(format!("Supabase {status}: {body}")))
    }

    /// Run the `match_embeddings` similarity RPC.
    pub async fn match_embeddings(
        &self,
        query_embedding: &[f32],
        match_count: usize,
        session_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let mut params = json!({
            "query_embedding": query_embedding,
            "match_count": match_count,
        });
        if let Some(filter) = session_filter {
            params["session_filter"] = json!(filter);
        }

        let response = self
            .request(reqwest::Method::POST, "rpc/match_embeddings")
            .json(&params)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("match_embeddings: {e}")))?;

        let rows: Vec<MatchRow> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("match_embeddings parse: {e}")))?;

        debug!(count = rows.len(), "Vector search complete");

        Ok(rows
            .into_iter()
            .map(|row| SearchHit {
                text: row.text,
                timestamp: row.timestamp,
                session_info: row.session_info,
                score: row.similarity,
            })
            .collect())
    }

    /// Check whether a source was already ingested; returns its UUID.
    pub async fn find_source(&self, source_type: &str, source_id: &str) -> Result<Option<String>> {
        let response = self
            .request(reqwest::Method::GET, "sources")
            .query(&[
                ("select", "id"),
                ("source_type", &format!("eq.{source_type}")),
                ("source_id", &format!("eq.{source_id}")),
            ])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("find_source: {e}")))?;

        let rows: Vec<IdRow> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("find_source parse: {e}")))?;

        Ok(rows.into_iter().next().map(|r| r.id))
    }

    /// Insert a source record, returning its UUID.
    pub async fn insert_source(
        &self,
        source_type: &str,
        source_id: &str,
        session_info: &str,
        chunk_count: usize,
    ) -> Result<String> {
        let response = self
            .request(reqwest::Method::POST, "sources")
            .header("prefer", "return=representation")
            .json(&json!({
                "source_type": source_type,
                "source_id": source_id,
                "session_info": session_info,
                "chunk_count": chunk_count,
            }))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("insert_source: {e}")))?;

        let rows: Vec<IdRow> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("insert_source parse: {e}")))?;

        rows.into_iter()
            .next()
            .map(|r| r.id)
            .ok_or_else(|| Error::Upstream("insert_source returned no row".into()))
    }

    /// Insert one embedded chunk for a source.
    pub async fn insert_embedding(
        &self,
        source_uuid: &str,
        text: &str,
        timestamp: &str,
        embedding: &[f32],
    ) -> Result<()> {
        let response = self
            .request(reqwest::Method::POST, "embeddings")
            .json(&json!({
                "source_id": source_uuid,
                "text": text,
                "timestamp": timestamp,
                "embedding": embedding,
            }))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("insert_embedding: {e}")))?;

        Self::check(response).await?;
        Ok(())
    }

    /// Set the final chunk count on a source record.
    pub async fn update_chunk_count(&self, source_uuid: &str, chunk_count: usize) -> Result<()> {
        let response = self
            .request(reqwest::Method::PATCH, "sources")
            .query(&[("id", &format!("eq.{source_uuid}"))])
            .json(&json!({ "chunk_count": chunk_count }))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("update_chunk_count: {e}")))?;

        Self::check(response).await?;
        Ok(())
    }

    /// List ingested sources, optionally filtered by type.
    pub async fn list_sources(&self, source_type: Option<&str>) -> Result<Vec<Value>> {
        let mut query = vec![
            (
                "select".to_string(),
                "id,source_type,source_id,session_info,chunk_count,processed_at".to_string(),
            ),
            ("order".to_string(), "processed_at.desc".to_string()),
        ];
        if let Some(st) = source_type {
            query.push(("source_type".to_string(), format!("eq.{st}")));
        }

        let response = self
            .request(reqwest::Method::GET, "sources")
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("list_sources: {e}")))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("list_sources parse: {e}")))
    }

    /// List distinct sessions with chunk counts, optionally filtered
    /// by a term matched against the session description.
    pub async fn list_sessions(&self, filter: Option<&str>) -> Result<Vec<Value>> {
        let mut query = vec![
            (
                "select".to_string(),
                "session_info,chunk_count,source_type,processed_at".to_string(),
            ),
            ("order".to_string(), "processed_at.desc".to_string()),
        ];
        if let Some(term) = filter {
            query.push(("session_info".to_string(), format!("ilike.*{term}*")));
        }

        let response = self
            .request(reqwest::Method::GET, "sources")
            .query(&query)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("list_sessions: {e}")))?;

        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("list_sessions parse: {e}")))
    }

    /// Delete a source and its embeddings. Returns the number of
    /// embedding rows removed. Embeddings go first (FK constraint).
    pub async fn delete_source(&self, source_uuid: &str) -> Result<usize> {
        let response = self
            .request(reqwest::Method::DELETE, "embeddings")
            .header("prefer", "return=representation")
            .query(&[("source_id", &format!("eq.{source_uuid}"))])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("delete embeddings: {e}")))?;

        let deleted: Vec<Value> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("delete embeddings parse: {e}")))?;

        let response = self
            .request(reqwest::Method::DELETE, "sources")
            .header("prefer", "return=representation")
            .query(&[("id", &format!("eq.{source_uuid}"))])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("delete source: {e}")))?;

        let rows: Vec<Value> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("delete source parse: {e}")))?;

        if rows.is_empty() {
            return Err(Error::NotFound(format!("source {source_uuid}")));
        }

        Ok(deleted.len())
    }
}
