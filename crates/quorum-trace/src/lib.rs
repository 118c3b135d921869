//! Observability for voice sessions and chat runs.
//!
//! Voice mode talks WebRTC directly from the browser to the model
//! provider, so the backend never sees the conversation inline.
//! Instead the client reports raw events (`user_transcript`,
//! `assistant_response`, `function_call`) over HTTP and the
//! [`turns::TurnAggregator`] reconstructs discrete conversational
//! turns from that stream before forwarding them to a [`sink::TraceSink`].
//!
//! Tracing is best-effort throughout: sink failures are logged and
//! never surface to request handlers.

pub mod sink;
pub mod turns;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One finalized conversational turn, emitted by the aggregator.
/// Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub session_id: String,
    pub user_id: String,
    pub turn_number: u32,
    pub user_input: String,
    pub assistant_output: String,
    pub function_calls: Vec<FunctionCall>,
    pub timestamp: DateTime<Utc>,
}

/// A tool invocation recorded within a turn, in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub call: String,
    pub result: String,
}

/// A completed text-chat exchange, recorded by the answer coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTrace {
    pub trace_id: String,
    pub question: String,
    pub answer: String,
    pub user_id: String,
    pub model: String,
    pub web_search_enabled: bool,
    pub message_count: usize,
}
