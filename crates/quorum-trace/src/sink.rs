//! Trace sink — where finalized turns and chat records go.
//!
//! The production sink posts to a Langfuse-compatible ingestion
//! endpoint. [`MemorySink`] records in process memory for tests and
//! local debugging.

use async_trait::async_trait;
use base64::Engine;
use quorum_core::config::TraceConfig;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::{ChatTrace, Turn};

#[async_trait]
pub trait TraceSink: Send + Sync {
    async fn record_turn(&self, turn: &Turn) -> anyhow::Result<()>;
    async fn record_chat(&self, chat: &ChatTrace) -> anyhow::Result<()>;
    async fn record_feedback(
        &self,
        trace_id: &str,
        rating: &str,
        comment: Option<&str>,
    ) -> anyhow::Result<()>;
}

/// Sink used when tracing is disabled. Every call succeeds and does
/// nothing.
pub struct NoopSink;

#[async_trait]
impl TraceSink for NoopSink {
    async fn record_turn(&self, _turn: &Turn) -> anyhow::Result<()> {
        Ok(())
    }

    async fn record_chat(&self, _chat: &ChatTrace) -> anyhow::Result<()> {
        Ok(())
    }

    async fn record_feedback(
        &self,
        _trace_id: &str,
        _rating: &str,
        _comment: Option<&str>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// HTTP sink posting to a Langfuse-style `/api/public/ingestion`
/// batch endpoint with basic auth.
pub struct HttpTraceSink {
    client: reqwest::Client,
    base_url: String,
    auth_header: String,
}

impl HttpTraceSink {
    pub fn from_config(config: &TraceConfig) -> anyhow::Result<Self> {
        let public_key = config
            .public_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("TRACE_PUBLIC_KEY not set"))?;
        let secret_key = config
            .secret_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("TRACE_SECRET_KEY not set"))?;

        let auth = base64::engine::general_purpose::STANDARD
            .encode(format!("{public_key}:{secret_key}"));

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {auth}"),
        })
    }

    async fn ingest(&self, events: Vec<serde_json::Value>) -> anyhow::Result<()> {
        let response = self
            .client
            .post(format!("{}/api/public/ingestion", self.base_url))
            .header("authorization", &self.auth_header)
            .json(&json!({ "batch": events }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("trace ingestion failed {status}: {body}");
        }
        Ok(())
    }

    fn envelope(event_type: &str, body: serde_json::Value) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4().to_string(),
            "type": event_type,
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "body": body,
        })
    }
}

#[async_trait]
impl TraceSink for HttpTraceSink {
    async fn record_turn(&self, turn: &Turn) -> anyhow::Result<()> {
        debug!(
            session_id = %turn.session_id,
            turn_number = turn.turn_number,
            "Recording voice turn"
        );

        self.ingest(vec![Self::envelope(
            "trace-create",
            json!({
                "id": Uuid::new_v4().to_string(),
                "name": "voice-turn",
                "input": turn.user_input,
                "output": turn.assistant_output,
                "userId": turn.user_id,
                "sessionId": turn.session_id,
                "tags": ["quorum", "voice-mode"],
                "metadata": {
                    "mode": "realtime-webrtc",
                    "turn_number": turn.turn_number,
                    "function_calls": turn.function_calls,
                },
                "timestamp": turn.timestamp.to_rfc3339(),
            }),
        )])
        .await
    }

    async fn record_chat(&self, chat: &ChatTrace) -> anyhow::Result<()> {
        self.ingest(vec![Self::envelope(
            "trace-create",
            json!({
                "id": chat.trace_id,
                "name": "quorum-chat",
                "input": chat.question,
                "output": chat.answer,
                "userId": chat.user_id,
                "tags": ["quorum", "meeting-notes"],
                "metadata": {
                    "model": chat.model,
                    "web_search_enabled": chat.web_search_enabled,
                    "message_count": chat.message_count,
                },
            }),
        )])
        .await
    }

    async fn record_feedback(
        &self,
        trace_id: &str,
        rating: &str,
        comment: Option<&str>,
    ) -> anyhow::Result<()> {
        self.ingest(vec![Self::envelope(
            "score-create",
            json!({
                "id": Uuid::new_v4().to_string(),
                "traceId": trace_id,
                "name": "user-feedback",
                "value": if rating == "like" { 1 } else { 0 },
                "comment": comment,
            }),
        )])
        .await
    }
}

/// In-memory sink for tests and local debugging.
#[derive(Default)]
pub struct MemorySink {
    turns: std::sync::Mutex<Vec<Turn>>,
    chats: std::sync::Mutex<Vec<ChatTrace>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.turns.lock().unwrap().clone()
    }

    pub fn chats(&self) -> Vec<ChatTrace> {
        self.chats.lock().unwrap().clone()
    }

    /// Poll until `count` turns have been recorded. Turn dispatch is
    /// fire-and-forget, so tests wait instead of assuming ordering
    /// with the aggregator call.
    pub async fn wait_for_turns(&self, count: usize) -> Vec<Turn> {
        for _ in 0..200 {
            let turns = self.turns();
            if turns.len() >= count {
                return turns;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        self.turns()
    }
}

#[async_trait]
impl TraceSink for MemorySink {
    async fn record_turn(&self, turn: &Turn) -> anyhow::Result<()> {
        self.turns.lock().unwrap().push(turn.clone());
        Ok(())
    }

    async fn record_chat(&self, chat: &ChatTrace) -> anyhow::Result<()> {
        self.chats.lock().unwrap().push(chat.clone());
        Ok(())
    }

    async fn record_feedback(
        &self,
        _trace_id: &str,
        _rating: &str,
        _comment: Option<&str>,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}
