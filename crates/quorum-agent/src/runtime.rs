//! Agent run loop — streams the LLM and executes tool calls.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::provider::{ChatProvider, ChatRequest};
use crate::tools::{to_llm_tool, Tool};
use crate::ToolCallChunk;

/// Bound on LLM round-trips per question. The fixed tool set makes
/// long chains pathological rather than useful.
const MAX_TOOL_ITERATIONS: usize = 8;

/// A configured agent for one question/answer exchange.
pub struct Agent {
    provider: Arc<dyn ChatProvider>,
    tools: Vec<Arc<dyn Tool>>,
    model: String,
    instructions: String,
}

impl Agent {
    pub fn new(provider: Arc<dyn ChatProvider>, model: String, instructions: String) -> Self {
        Self {
            provider,
            tools: Vec::new(),
            model,
            instructions,
        }
    }

    pub fn add_tool(&mut self, tool: Arc<dyn Tool>) {
        self.tools.push(tool);
    }

    fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Answer one question, pushing text deltas into `text_tx` in
    /// generation order. Returns the complete answer text.
    ///
    /// A closed `text_tx` receiver means the consumer is gone; the
    /// run stops promptly and returns an error.
    pub async fn run(
        &self,
        question: &str,
        text_tx: mpsc::Sender<String>,
    ) -> anyhow::Result<String> {
        let mut messages = vec![
            json!({ "role": "system", "content": self.instructions }),
            json!({ "role": "user", "content": question }),
        ];

        let tool_defs: Option<Vec<serde_json::Value>> = (!self.tools.is_empty())
            .then(|| self.tools.iter().map(|t| to_llm_tool(t.as_ref())).collect());

        let mut answer = String::new();

        for iteration in 0..MAX_TOOL_ITERATIONS {
            debug!(iteration, "Agent loop iteration");

            let request = ChatRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                tools: tool_defs.clone(),
            };

            let mut stream = self.provider.stream(&request).await?;
            let mut tool_calls: Vec<ToolCallChunk> = Vec::new();
            let mut stop_reason: Option<String> = None;

            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;

                if let Some(delta) = chunk.delta {
                    answer.push_str(&delta);
                    if text_tx.send(delta).await.is_err() {
                        anyhow::bail!("consumer disconnected mid-stream");
                    }
                }
                if let Some(tc) = chunk.tool_call {
                    tool_calls.push(tc);
                }
                if let Some(reason) = chunk.stop_reason {
                    stop_reason = Some(reason);
                }
            }

            if tool_calls.is_empty() {
                return Ok(answer);
            }

            debug!(
                count = tool_calls.len(),
                stop_reason = stop_reason.as_deref().unwrap_or(""),
                "Executing tool calls"
            );

            // Echo the assistant turn with its tool calls, then append
            // one tool-result message per call, in call order.
            let call_json: Vec<serde_json::Value> = tool_calls
                .iter()
                .map(|tc| {
                    json!({
                        "id": tc.id,
                        "type": "function",
                        "function": { "name": tc.name, "arguments": tc.arguments }
                    })
                })
                .collect();
            messages.push(json!({ "role": "assistant", "tool_calls": call_json }));

            for tc in tool_calls {
                let content = self.execute_tool(&tc).await;
                messages.push(json!({
                    "role": "tool",
                    "tool_call_id": tc.id,
                    "content": content,
                }));
            }
        }

        warn!("Agent hit tool iteration limit");
        Ok(answer)
    }

    /// Run one tool call; failures become text the model can react
    /// to rather than aborting the answer.
    async fn execute_tool(&self, tc: &ToolCallChunk) -> String {
        let Some(tool) = self.find_tool(&tc.name) else {
            return format!("Error: unknown tool '{}'", tc.name);
        };

        let params: serde_json::Value = match serde_json::from_str(&tc.arguments) {
            Ok(v) => v,
            Err(e) => return format!("Error: invalid tool arguments: {e}"),
        };

        match tool.execute(params).await {
            Ok(content) => content,
            Err(e) => {
                warn!(tool = %tc.name, %e, "Tool execution failed");
                format!("Error: {e}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ChunkStream;
    use crate::CompletionChunk;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted provider: each call pops the next chunk list.
    struct ScriptedProvider {
        turns: Mutex<Vec<Vec<CompletionChunk>>>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn new(turns: Vec<Vec<CompletionChunk>>) -> Self {
            Self {
                turns: Mutex::new(turns),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn stream(&self, request: &ChatRequest) -> anyhow::Result<ChunkStream> {
            self.requests.lock().unwrap().push(request.clone());
            let mut turns = self.turns.lock().unwrap();
            if turns.is_empty() {
                anyhow::bail!("scripted provider exhausted");
            }
            let chunks = turns.remove(0);
            Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
        }
    }

    struct EchoTool {
        calls: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "echoes"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }
        async fn execute(&self, params: serde_json::Value) -> anyhow::Result<String> {
            self.calls.lock().unwrap().push(params.clone());
            Ok(format!("echoed {}", params["x"]))
        }
    }

    fn text(t: &str) -> CompletionChunk {
        CompletionChunk {
            delta: Some(t.into()),
            tool_call: None,
            stop_reason: None,
        }
    }

    fn call(id: &str, name: &str, args: &str) -> CompletionChunk {
        CompletionChunk {
            delta: None,
            tool_call: Some(ToolCallChunk {
                id: id.into(),
                name: name.into(),
                arguments: args.into(),
            }),
            stop_reason: None,
        }
    }

    #[tokio::test]
    async fn test_plain_answer_streams_deltas_in_order() {
        let provider = Arc::new(ScriptedProvider::new(vec![vec![
            text("Hel"),
            text("lo"),
        ]]));
        let agent = Agent::new(provider, "m".into(), "inst".into());

        let (tx, mut rx) = mpsc::channel(1);
        let handle = tokio::spawn(async move { agent.run("q", tx).await });

        assert_eq!(rx.recv().await.unwrap(), "Hel");
        assert_eq!(rx.recv().await.unwrap(), "lo");
        assert!(rx.recv().await.is_none());
        assert_eq!(handle.await.unwrap().unwrap(), "Hello");
    }

    #[tokio::test]
    async fn test_tool_call_round_trip() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            vec![call("c1", "echo", r#"{"x": 7}"#)],
            vec![text("done")],
        ]));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut agent = Agent::new(provider.clone(), "m".into(), "inst".into());
        agent.add_tool(Arc::new(EchoTool {
            calls: calls.clone(),
        }));

        let (tx, mut rx) = mpsc::channel(8);
        let answer = agent.run("q", tx).await.unwrap();
        assert_eq!(answer, "done");
        assert_eq!(rx.recv().await.unwrap(), "done");

        // Tool saw the parsed arguments
        assert_eq!(calls.lock().unwrap()[0]["x"], 7);

        // Second request carried the tool result back to the model
        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let last = requests[1].messages.last().unwrap();
        assert_eq!(last["role"], "tool");
        assert_eq!(last["tool_call_id"], "c1");
        assert_eq!(last["content"], "echoed 7");
    }

    #[tokio::test]
    async fn test_unknown_tool_reported_to_model() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            vec![call("c1", "nope", "{}")],
            vec![text("recovered")],
        ]));
        let agent = Agent::new(provider.clone(), "m".into(), "inst".into());

        let (tx, _rx) = mpsc::channel(8);
        let answer = agent.run("q", tx).await.unwrap();
        assert_eq!(answer, "recovered");

        let requests = provider.requests.lock().unwrap();
        let last = requests[1].messages.last().unwrap();
        assert!(last["content"]
            .as_str()
            .unwrap()
            .starts_with("Error: unknown tool"));
    }

    #[tokio::test]
    async fn test_consumer_disconnect_stops_run() {
        let provider = Arc::new(ScriptedProvider::new(vec![vec![
            text("a"),
            text("b"),
            text("c"),
        ]]));
        let agent = Agent::new(provider, "m".into(), "inst".into());

        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let err = agent.run("q", tx).await.unwrap_err();
        assert!(err.to_string().contains("consumer disconnected"));
    }
}
