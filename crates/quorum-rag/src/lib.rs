//! RAG collaborators — embedding generation and vector search.
//!
//! Everything in this crate is thin I/O glue over the OpenAI
//! embeddings API and Supabase PostgREST. The interesting logic lives
//! elsewhere; these clients exist so the rest of the workspace can say
//! "embed this text" and "run a similarity query" without owning
//! either implementation.

pub mod embeddings;
pub mod store;

use std::sync::Arc;

use quorum_core::types::SearchHit;
use quorum_core::Result;

use crate::embeddings::EmbeddingsClient;
use crate::store::VectorStore;

/// Search service combining the embeddings client and vector store.
pub struct RagService {
    embeddings: Arc<EmbeddingsClient>,
    store: Arc<VectorStore>,
}

impl RagService {
    pub fn new(embeddings: Arc<EmbeddingsClient>, store: Arc<VectorStore>) -> Self {
        Self { embeddings, store }
    }

    /// Vector-similarity search over the meeting notes.
    pub async fn search(
        &self,
        question: &str,
        top_k: usize,
        session_filter: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        let query_embedding = self.embeddings.embed(question).await?;
        self.store
            .match_embeddings(&query_embedding, top_k, session_filter)
            .await
    }

    /// List known sessions, optionally narrowed by a filter term.
    pub async fn list_sessions(&self, filter: Option<&str>) -> Result<Vec<serde_json::Value>> {
        self.store.list_sessions(filter).await
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    pub fn embeddings(&self) -> &Arc<EmbeddingsClient> {
        &self.embeddings
    }
}
