//! Streaming Q&A agent for the meeting-notes chatbot.
//!
//! A fixed two/three-tool configuration: `search_meeting_notes` over
//! the vector store, `eventbrite` when the integration is configured,
//! and `web_search` when enabled per request. This is deliberately
//! not a general agent framework — the loop in [`runtime`] streams
//! one answer and the coordinator in [`answer`] frames it for SSE
//! delivery.

pub mod answer;
pub mod prompt;
pub mod provider;
pub mod runtime;
pub mod sse;
pub mod tools;

pub use answer::{answer_stream, AnswerEvent, TraceContext};
pub use runtime::Agent;

/// A streamed chunk from the LLM.
#[derive(Debug, Clone)]
pub struct CompletionChunk {
    /// Text delta, in generation order.
    pub delta: Option<String>,
    /// A completed tool call (emitted once fully accumulated).
    pub tool_call: Option<ToolCallChunk>,
    /// Finish reason reported by the API for this turn.
    pub stop_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ToolCallChunk {
    pub id: String,
    pub name: String,
    pub arguments: String,
}
