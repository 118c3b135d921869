//! Streaming chat endpoint.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use quorum_agent::prompt;
use quorum_agent::tools::{EventbriteTool, SearchNotesTool, WebSearchTool};
use quorum_agent::{answer_stream, Agent, AnswerEvent, TraceContext};
use quorum_core::types::QuestionRequest;
use quorum_core::Error;
use tokio_stream::StreamExt;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::routes::admit;
use crate::state::AppState;

const MAX_QUESTION_CHARS: usize = 4000;
const MAX_HISTORY_MESSAGES: usize = 50;

/// `POST /v1/chat` — answer a question as an SSE stream: optional
/// `event: trace_id`, then text chunks with newlines escaped as the
/// two-character sequence `\n`, then `data: [DONE]`.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<QuestionRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let identity = admit(&state, &headers, Some(peer))?;
    validate(&req)?;

    let provider = state
        .provider
        .clone()
        .ok_or_else(|| ApiError(Error::Unconfigured("OpenAI".into())))?;

    let template = prompt::load_prompt(state.config.prompt_dir.as_deref(), "assistant.txt");
    let instructions = prompt::build_instructions(&template, &req.messages);

    let mut agent = Agent::new(provider, state.config.openai.chat_model.clone(), instructions);
    if let Some(rag) = &state.rag {
        agent.add_tool(Arc::new(SearchNotesTool::new(rag.clone())));
    }
    if let Some(events) = &state.events {
        agent.add_tool(Arc::new(EventbriteTool::new(events.clone())));
    }
    if req.enable_web_search {
        if let Some(search) = &state.config.search {
            agent.add_tool(Arc::new(WebSearchTool::new(
                search.base_url.clone(),
                search.api_key.clone(),
            )?));
        }
    }

    info!(
        user = %identity,
        question_chars = req.question.chars().count(),
        history = req.messages.len(),
        "Chat request"
    );

    let trace = state.config.trace.enabled.then(|| TraceContext {
        sink: state.sink.clone(),
        trace_id: Uuid::new_v4().to_string(),
        question: req.question.clone(),
        user_id: identity,
        model: state.config.openai.chat_model.clone(),
        web_search_enabled: req.enable_web_search,
        message_count: req.messages.len(),
    });

    let question = req.question;
    let events = answer_stream(trace, move |tx| async move {
        agent.run(&question, tx).await
    });

    let sse = events.map(|event| {
        Ok(match event {
            AnswerEvent::TraceId(id) => Event::default().event("trace_id").data(id),
            AnswerEvent::Text(text) => Event::default().data(escape_sse_text(&text)),
            AnswerEvent::Done => Event::default().data("[DONE]"),
        })
    });

    Ok(Sse::new(sse).keep_alive(KeepAlive::default()))
}

/// Newlines inside a fragment would terminate the SSE data line, so
/// they travel as the literal two-character sequence `\n` and the
/// client restores them.
fn escape_sse_text(text: &str) -> String {
    text.replace('\n', "\\n")
}

fn validate(req: &QuestionRequest) -> ApiResult<()> {
    if req.question.trim().is_empty() {
        return Err(ApiError(Error::Validation("question must not be empty".into())));
    }
    if req.question.chars().count() > MAX_QUESTION_CHARS {
        return Err(ApiError(Error::Validation(format!(
            "question exceeds {MAX_QUESTION_CHARS} characters"
        ))));
    }
    if req.messages.len() > MAX_HISTORY_MESSAGES {
        return Err(ApiError(Error::Validation(format!(
            "history exceeds {MAX_HISTORY_MESSAGES} messages"
        ))));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quorum_core::types::ChatMessage;

    fn request(question: &str, history: usize) -> QuestionRequest {
        QuestionRequest {
            question: question.into(),
            messages: (0..history)
                .map(|i| ChatMessage {
                    role: "user".into(),
                    content: format!("m{i}"),
                })
                .collect(),
            enable_web_search: true,
        }
    }

    #[test]
    fn test_sse_newline_escaping() {
        assert_eq!(escape_sse_text("a\nb\n"), "a\\nb\\n");
        assert_eq!(escape_sse_text("plain"), "plain");
    }

    #[test]
    fn test_validation_bounds() {
        assert!(validate(&request("hi", 0)).is_ok());
        assert!(validate(&request("hi", 50)).is_ok());
        assert!(validate(&request("", 0)).is_err());
        assert!(validate(&request("  ", 0)).is_err());
        assert!(validate(&request(&"x".repeat(4001), 0)).is_err());
        assert!(validate(&request("hi", 51)).is_err());
    }
}
