//! LLM provider abstraction and the OpenAI-compatible implementation.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use quorum_core::config::OpenAiConfig;
use serde::Deserialize;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, trace};

use crate::sse::parse_sse_stream;
use crate::{CompletionChunk, ToolCallChunk};

/// A streaming chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    /// Messages in OpenAI wire format, system message included.
    pub messages: Vec<serde_json::Value>,
    pub tools: Option<Vec<serde_json::Value>>,
}

pub type ChunkStream = Pin<Box<dyn Stream<Item = anyhow::Result<CompletionChunk>> + Send>>;

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Stream a chat completion.
    async fn stream(&self, request: &ChatRequest) -> anyhow::Result<ChunkStream>;
}

/// OpenAI chat-completions provider (works against any
/// OpenAI-compatible endpoint).
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiProvider {
    pub fn from_config(config: &OpenAiConfig) -> anyhow::Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()?,
            base_url: config.base_url.clone(),
            api_key,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: ChunkDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

/// Tool call arguments arrive as a stream of JSON string fragments
/// keyed by index; this accumulates them until the turn finishes.
#[derive(Debug, Default, Clone)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

#[async_trait]
impl ChatProvider for OpenAiProvider {
    async fn stream(&self, request: &ChatRequest) -> anyhow::Result<ChunkStream> {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "stream": true,
        });
        if let Some(ref tools) = request.tools {
            body["tools"] = json!(tools);
        }

        debug!(model = %request.model, "Streaming chat completion");

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("chat completions API {status}: {body}");
        }

        struct State {
            sse: Pin<Box<dyn Stream<Item = anyhow::Result<crate::sse::SseEvent>> + Send>>,
            tool_calls: Vec<ToolCallAccumulator>,
            pending: std::collections::VecDeque<CompletionChunk>,
            done: bool,
        }

        let stream = futures::stream::unfold(
            State {
                sse: Box::pin(parse_sse_stream(response)),
                tool_calls: Vec::new(),
                pending: Default::default(),
                done: false,
            },
            |mut state| async move {
                loop {
                    if let Some(chunk) = state.pending.pop_front() {
                        return Some((Ok(chunk), state));
                    }
                    if state.done {
                        return None;
                    }

                    let event = match state.sse.next().await {
                        Some(Ok(event)) => event,
                        Some(Err(e)) => {
                            state.done = true;
                            return Some((Err(e), state));
                        }
                        None => {
                            state.done = true;
                            flush_tool_calls(&mut state.tool_calls, &mut state.pending);
                            continue;
                        }
                    };

                    let data = event.data.trim();
                    if data == "[DONE]" {
                        state.done = true;
                        flush_tool_calls(&mut state.tool_calls, &mut state.pending);
                        continue;
                    }

                    let parsed: ChatCompletionChunk = match serde_json::from_str(data) {
                        Ok(c) => c,
                        Err(e) => {
                            trace!(%e, data, "Unparseable completion chunk skipped");
                            continue;
                        }
                    };

                    let Some(choice) = parsed.choices.into_iter().next() else {
                        continue;
                    };

                    if let Some(deltas) = choice.delta.tool_calls {
                        for tc in deltas {
                            while state.tool_calls.len() <= tc.index {
                                state.tool_calls.push(ToolCallAccumulator::default());
                            }
                            let acc = &mut state.tool_calls[tc.index];
                            if let Some(id) = tc.id {
                                acc.id = id;
                            }
                            if let Some(f) = tc.function {
                                if let Some(name) = f.name {
                                    acc.name.push_str(&name);
                                }
                                if let Some(args) = f.arguments {
                                    acc.arguments.push_str(&args);
                                }
                            }
                        }
                    }

                    if let Some(text) = choice.delta.content {
                        if !text.is_empty() {
                            state.pending.push_back(CompletionChunk {
                                delta: Some(text),
                                tool_call: None,
                                stop_reason: None,
                            });
                        }
                    }

                    if let Some(reason) = choice.finish_reason {
                        state.pending.push_back(CompletionChunk {
                            delta: None,
                            tool_call: None,
                            stop_reason: Some(reason),
                        });
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }
}

fn flush_tool_calls(
    accumulators: &mut Vec<ToolCallAccumulator>,
    pending: &mut std::collections::VecDeque<CompletionChunk>,
) {
    for acc in accumulators.drain(..) {
        if acc.name.is_empty() {
            continue;
        }
        pending.push_back(CompletionChunk {
            delta: None,
            tool_call: Some(ToolCallChunk {
                id: acc.id,
                name: acc.name,
                arguments: acc.arguments,
            }),
            stop_reason: None,
        });
    }
}
