//! Voice turn aggregation state machine.
//!
//! The realtime event source delivers transcripts, responses, and
//! function calls asynchronously with no explicit turn boundaries.
//! Turn boundaries are reconstructed from the call-and-response
//! cadence: a new user transcript closes any non-empty pending turn,
//! and an assistant response closes the turn whose input it answers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use quorum_core::types::VoiceEventType;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::sink::TraceSink;
use crate::{FunctionCall, Turn};

const NO_INPUT: &str = "No input";
const NO_OUTPUT: &str = "No output";

/// The turn being accumulated for a session. At most one exists per
/// session at any time.
#[derive(Debug, Default)]
struct PendingTurn {
    user_input: Option<String>,
    assistant_output: Option<String>,
    function_calls: Vec<FunctionCall>,
}

impl PendingTurn {
    /// A turn is worth emitting once either side of the exchange has
    /// been recorded. Function calls alone do not make a turn.
    fn has_content(&self) -> bool {
        self.user_input.is_some() || self.assistant_output.is_some()
    }
}

/// State for one active voice connection.
#[derive(Debug)]
struct VoiceSession {
    session_id: String,
    user_id: String,
    turn_count: u32,
    pending: PendingTurn,
}

impl VoiceSession {
    fn new(session_id: String, user_id: String) -> Self {
        Self {
            session_id,
            user_id,
            turn_count: 0,
            pending: PendingTurn::default(),
        }
    }

    /// Finalize the pending turn, substituting placeholders for
    /// whichever side is missing, and reset for the next turn.
    fn flush(&mut self) -> Turn {
        self.turn_count += 1;
        let pending = std::mem::take(&mut self.pending);
        Turn {
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            turn_number: self.turn_count,
            user_input: pending.user_input.unwrap_or_else(|| NO_INPUT.into()),
            assistant_output: pending.assistant_output.unwrap_or_else(|| NO_OUTPUT.into()),
            function_calls: pending.function_calls,
            timestamp: Utc::now(),
        }
    }

    /// Apply one incoming event; returns a finalized turn when the
    /// event closed one.
    fn apply(
        &mut self,
        event_type: VoiceEventType,
        content: String,
        metadata: Option<&serde_json::Value>,
    ) -> Option<Turn> {
        match event_type {
            VoiceEventType::UserTranscript => {
                // A new user utterance starts a new turn. Anything
                // still pending belongs to the previous exchange and
                // must be emitted, never merged or dropped — even if
                // the assistant reply for it never arrived.
                let flushed = self.pending.has_content().then(|| self.flush());
                self.pending.user_input = Some(content);
                flushed
            }
            VoiceEventType::AssistantResponse => {
                self.pending.assistant_output = Some(content);
                // Normal closing transition: input already present.
                self.pending.user_input.is_some().then(|| self.flush())
            }
            VoiceEventType::FunctionCall => {
                let result = metadata
                    .and_then(|m| m.get("result"))
                    .and_then(|r| r.as_str())
                    .unwrap_or_default()
                    .to_string();
                self.pending.function_calls.push(FunctionCall {
                    call: content,
                    result,
                });
                None
            }
        }
    }

    /// Final flush on session end; emits a turn only when one side of
    /// an exchange was recorded.
    fn close(&mut self) -> Option<Turn> {
        self.pending.has_content().then(|| self.flush())
    }
}

/// Registry of active voice sessions.
///
/// The outer map lock is held only for lookup and insert/remove; each
/// session has its own mutex so unrelated sessions never serialize
/// behind one another, while events for one session are processed in
/// arrival order (tokio mutexes queue fairly).
pub struct TurnAggregator {
    sessions: RwLock<HashMap<String, Arc<Mutex<VoiceSession>>>>,
    sink: Arc<dyn TraceSink>,
}

impl TurnAggregator {
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            sink,
        }
    }

    /// Register a session. The session id doubles as the trace id the
    /// client echoes back on every event.
    pub async fn start(&self, session_id: &str, user_id: &str) -> String {
        info!(%session_id, %user_id, "Voice session started");
        self.sessions.write().await.insert(
            session_id.to_string(),
            Arc::new(Mutex::new(VoiceSession::new(
                session_id.to_string(),
                user_id.to_string(),
            ))),
        );
        session_id.to_string()
    }

    /// Feed one event into the session's state machine. Unknown
    /// sessions are ignored (the client may race a late event past
    /// the session end).
    pub async fn event(
        &self,
        session_id: &str,
        event_type: VoiceEventType,
        content: String,
        metadata: Option<serde_json::Value>,
    ) {
        let session = self.sessions.read().await.get(session_id).cloned();
        let Some(session) = session else {
            debug!(%session_id, "Voice event for unknown session ignored");
            return;
        };

        let flushed = session
            .lock()
            .await
            .apply(event_type, content, metadata.as_ref());

        if let Some(turn) = flushed {
            self.dispatch(turn);
        }
    }

    /// End a session: flush any partially-filled turn, then drop the
    /// session from the registry.
    pub async fn end(&self, session_id: &str, duration_ms: u64, message_count: u32) {
        let session = self.sessions.write().await.remove(session_id);
        let Some(session) = session else {
            debug!(%session_id, "Voice end for unknown session ignored");
            return;
        };

        let mut session = session.lock().await;
        if let Some(turn) = session.close() {
            self.dispatch(turn);
        }

        info!(
            %session_id,
            turns = session.turn_count,
            duration_ms,
            message_count,
            "Voice session ended"
        );
    }

    /// Forward a finalized turn to the sink, fire-and-forget. Sink
    /// trouble is an observability problem, not a caller problem.
    fn dispatch(&self, turn: Turn) {
        let sink = self.sink.clone();
        tokio::spawn(async move {
            if let Err(e) = sink.record_turn(&turn).await {
                warn!(
                    session_id = %turn.session_id,
                    turn_number = turn.turn_number,
                    %e,
                    "Failed to record voice turn"
                );
            }
        });
    }

    /// Number of currently active sessions (for health reporting).
    pub async fn active_sessions(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use serde_json::json;

    fn aggregator() -> (TurnAggregator, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (TurnAggregator::new(sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_complete_turn() {
        let (agg, sink) = aggregator();
        agg.start("s1", "10.0.0.1").await;

        agg.event("s1", VoiceEventType::UserTranscript, "A".into(), None)
            .await;
        agg.event("s1", VoiceEventType::AssistantResponse, "B".into(), None)
            .await;

        let turns = sink.wait_for_turns(1).await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].turn_number, 1);
        assert_eq!(turns[0].user_input, "A");
        assert_eq!(turns[0].assistant_output, "B");
        assert!(turns[0].function_calls.is_empty());
        assert_eq!(turns[0].user_id, "10.0.0.1");
    }

    #[tokio::test]
    async fn test_back_to_back_user_transcripts() {
        let (agg, sink) = aggregator();
        agg.start("s1", "u").await;

        agg.event("s1", VoiceEventType::UserTranscript, "A".into(), None)
            .await;
        agg.event("s1", VoiceEventType::UserTranscript, "C".into(), None)
            .await;

        // The first utterance is emitted with a placeholder output,
        // never dropped or merged into the second.
        let turns = sink.wait_for_turns(1).await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].user_input, "A");
        assert_eq!(turns[0].assistant_output, "No output");

        // The second is still pending; ending the session flushes it.
        agg.end("s1", 1000, 2).await;
        let turns = sink.wait_for_turns(2).await;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].user_input, "C");
        assert_eq!(turns[1].assistant_output, "No output");
        assert_eq!(turns[1].turn_number, 2);
    }

    #[tokio::test]
    async fn test_function_calls_preserved_in_order() {
        let (agg, sink) = aggregator();
        agg.start("s1", "u").await;

        agg.event("s1", VoiceEventType::UserTranscript, "A".into(), None)
            .await;
        agg.event(
            "s1",
            VoiceEventType::FunctionCall,
            "search_meeting_notes({\"query\":\"roadmap\"})".into(),
            Some(json!({"result": "3 hits"})),
        )
        .await;
        agg.event(
            "s1",
            VoiceEventType::FunctionCall,
            "eventbrite({\"action\":\"list\"})".into(),
            Some(json!({"result": "2 events"})),
        )
        .await;
        agg.event("s1", VoiceEventType::AssistantResponse, "B".into(), None)
            .await;

        let turns = sink.wait_for_turns(1).await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].function_calls.len(), 2);
        assert!(turns[0].function_calls[0].call.starts_with("search_meeting_notes"));
        assert_eq!(turns[0].function_calls[0].result, "3 hits");
        assert_eq!(turns[0].function_calls[1].result, "2 events");
    }

    #[tokio::test]
    async fn test_function_call_alone_never_flushes() {
        let (agg, sink) = aggregator();
        agg.start("s1", "u").await;

        agg.event(
            "s1",
            VoiceEventType::FunctionCall,
            "f(1)".into(),
            Some(json!({"result": "r"})),
        )
        .await;
        agg.end("s1", 100, 0).await;

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(sink.turns().is_empty());
    }

    #[tokio::test]
    async fn test_session_end_flushes_partial_turn() {
        let (agg, sink) = aggregator();
        agg.start("s1", "u").await;

        agg.event("s1", VoiceEventType::UserTranscript, "A".into(), None)
            .await;
        agg.end("s1", 5000, 1).await;

        let turns = sink.wait_for_turns(1).await;
        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].user_input, "A");
        assert_eq!(turns[0].assistant_output, "No output");
        assert_eq!(agg.active_sessions().await, 0);
    }

    #[tokio::test]
    async fn test_clean_session_end_emits_nothing() {
        let (agg, sink) = aggregator();
        agg.start("s1", "u").await;

        agg.event("s1", VoiceEventType::UserTranscript, "A".into(), None)
            .await;
        agg.event("s1", VoiceEventType::AssistantResponse, "B".into(), None)
            .await;
        agg.end("s1", 5000, 2).await;

        let turns = sink.wait_for_turns(1).await;
        assert_eq!(turns.len(), 1);
    }

    #[tokio::test]
    async fn test_events_for_unknown_session_ignored() {
        let (agg, sink) = aggregator();
        agg.event("ghost", VoiceEventType::UserTranscript, "A".into(), None)
            .await;
        agg.end("ghost", 0, 0).await;

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(sink.turns().is_empty());
    }

    #[tokio::test]
    async fn test_turn_numbers_increment_per_session() {
        let (agg, sink) = aggregator();
        agg.start("s1", "u").await;
        agg.start("s2", "v").await;

        for session in ["s1", "s2"] {
            agg.event(session, VoiceEventType::UserTranscript, "hi".into(), None)
                .await;
            agg.event(session, VoiceEventType::AssistantResponse, "yo".into(), None)
                .await;
        }
        agg.event("s1", VoiceEventType::UserTranscript, "more".into(), None)
            .await;
        agg.event("s1", VoiceEventType::AssistantResponse, "sure".into(), None)
            .await;

        let turns = sink.wait_for_turns(3).await;
        let s1_numbers: Vec<u32> = turns
            .iter()
            .filter(|t| t.session_id == "s1")
            .map(|t| t.turn_number)
            .collect();
        let mut sorted = s1_numbers.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![1, 2]);
        assert!(turns
            .iter()
            .any(|t| t.session_id == "s2" && t.turn_number == 1));
    }
}
