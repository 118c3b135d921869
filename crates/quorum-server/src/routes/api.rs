//! Search, sessions, events, realtime session minting, and feedback.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use quorum_agent::prompt;
use quorum_core::types::{FeedbackRequest, FeedbackResponse};
use quorum_core::Error;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::error::{ApiError, ApiResult};
use crate::routes::admit;
use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "voice_sessions": state.turns.active_sessions().await,
    }))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    question: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default)]
    session_filter: Option<String>,
}

fn default_top_k() -> usize {
    5
}

/// `GET /v1/search` — raw vector search without answer synthesis.
pub async fn search(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    admit(&state, &headers, Some(peer))?;
    let rag = require_rag(&state)?;

    let results = rag
        .search(&query.question, query.top_k, query.session_filter.as_deref())
        .await?;
    Ok(Json(json!({ "results": results })))
}

#[derive(Deserialize)]
pub struct SessionsQuery {
    #[serde(default)]
    filter: Option<String>,
}

/// `GET /v1/sessions` — list ingested sessions.
pub async fn sessions(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<SessionsQuery>,
) -> ApiResult<Json<Value>> {
    admit(&state, &headers, Some(peer))?;
    let rag = require_rag(&state)?;

    let sessions = rag.list_sessions(query.filter.as_deref()).await?;
    Ok(Json(json!({ "sessions": sessions })))
}

#[derive(Deserialize)]
pub struct EventsQuery {
    #[serde(default = "default_action")]
    action: String,
    #[serde(default = "default_event_limit")]
    limit: usize,
    #[serde(default)]
    event_id: Option<String>,
}

fn default_action() -> String {
    "list".into()
}

fn default_event_limit() -> usize {
    3
}

/// `GET /v1/events` — upcoming events or one event's details.
pub async fn events(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<EventsQuery>,
) -> ApiResult<Json<Value>> {
    admit(&state, &headers, Some(peer))?;
    let events = state
        .events
        .as_ref()
        .ok_or_else(|| ApiError(Error::Unconfigured("Eventbrite".into())))?;

    if query.action == "details" {
        let event_id = query.event_id.ok_or_else(|| {
            ApiError(Error::Validation(
                "event_id required for details action".into(),
            ))
        })?;
        let event = events
            .details(&event_id)
            .await?
            .ok_or_else(|| ApiError(Error::NotFound("event".into())))?;
        return Ok(Json(json!({ "event": event })));
    }

    let upcoming = events.upcoming(query.limit).await?;
    Ok(Json(json!({ "events": upcoming })))
}

/// `POST /v1/realtime/session` — mint an ephemeral OpenAI Realtime
/// session. The browser connects to OpenAI directly over WebRTC with
/// the returned client secret; this server only holds the real key.
pub async fn realtime_session(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    admit(&state, &headers, Some(peer))?;
    let api_key = state
        .config
        .openai
        .api_key
        .as_deref()
        .ok_or_else(|| ApiError(Error::Unconfigured("OpenAI".into())))?;

    let template = prompt::load_prompt(state.config.prompt_dir.as_deref(), "voice.txt");
    let instructions = prompt::build_instructions(&template, &[]);

    let response = state
        .http
        .post(format!("{}/v1/realtime/sessions", state.config.openai.base_url))
        .bearer_auth(api_key)
        .json(&realtime_session_body(&instructions))
        .send()
        .await
        .map_err(|e| ApiError(Error::Upstream(format!("realtime session: {e}"))))?;

    if !response.status().is_success() {
        let status = response.status();
        let detail = response.text().await.unwrap_or_default();
        return Err(ApiError(Error::Upstream(format!(
            "realtime session returned {status}: {detail}"
        ))));
    }

    let session: Value = response
        .json()
        .await
        .map_err(|e| ApiError(Error::Upstream(format!("realtime session parse: {e}"))))?;
    Ok(Json(session))
}

/// Session payload with the fixed voice tool schemas. The voice model
/// calls back into `/v1/search`, `/v1/sessions`, and `/v1/events`
/// through the client, so the schemas mirror those endpoints.
fn realtime_session_body(instructions: &str) -> Value {
    json!({
        "model": "gpt-realtime",
        "modalities": ["audio", "text"],
        "voice": "shimmer",
        "instructions": instructions,
        "tools": [
            {
                "type": "function",
                "name": "meeting_notes",
                "description": "Query community meeting notes. Supports two actions: 'list_sessions' to see available meetings, and 'search' to find content within meetings.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "action": {
                            "type": "string",
                            "enum": ["list_sessions", "search"],
                            "description": "Use 'list_sessions' to see what meetings exist, 'search' to find specific content within meetings."
                        },
                        "filter": {
                            "type": "string",
                            "description": "For 'list_sessions': filter term to narrow results (e.g. 'November', 'Engineering', '2025')"
                        },
                        "query": {
                            "type": "string",
                            "description": "For 'search': the search query"
                        },
                        "top_k": {
                            "type": "integer",
                            "description": "For 'search': number of results to return (default: 5)",
                            "default": 5
                        },
                        "session_filter": {
                            "type": "string",
                            "description": "For 'search': filter for a specific session, e.g. 'Engineering breakout November 2025'"
                        }
                    },
                    "required": ["action"]
                }
            },
            {
                "type": "function",
                "name": "eventbrite",
                "description": "Get community events from Eventbrite. 'list' returns upcoming events, 'details' returns full information for one event.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "action": {
                            "type": "string",
                            "enum": ["list", "details"],
                            "description": "'list' for upcoming events, 'details' for one event"
                        },
                        "limit": {
                            "type": "integer",
                            "description": "For 'list': number of events to return (default: 3)",
                            "default": 3
                        },
                        "event_id": {
                            "type": "string",
                            "description": "For 'details': the event ID"
                        }
                    },
                    "required": ["action"]
                }
            }
        ],
        "input_audio_transcription": { "model": "whisper-1" },
        "turn_detection": {
            "type": "server_vad",
            "threshold": 0.5,
            "prefix_padding_ms": 300,
            "silence_duration_ms": 500
        }
    })
}

/// `POST /v1/feedback` — attach a user rating to a chat trace.
/// Best-effort: sink trouble is logged, the client still gets a 200.
pub async fn feedback(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<Json<FeedbackResponse>> {
    admit(&state, &headers, Some(peer))?;

    if req.rating != "like" && req.rating != "dislike" {
        return Err(ApiError(Error::Validation(
            "rating must be 'like' or 'dislike'".into(),
        )));
    }

    if state.config.trace.enabled {
        if let Err(e) = state
            .sink
            .record_feedback(&req.trace_id, &req.rating, req.comment.as_deref())
            .await
        {
            warn!(trace_id = %req.trace_id, %e, "Failed to record feedback");
        }
    }

    Ok(Json(FeedbackResponse {
        success: true,
        message: "Feedback recorded".into(),
    }))
}

fn require_rag(state: &AppState) -> ApiResult<&Arc<quorum_rag::RagService>> {
    state
        .rag
        .as_ref()
        .ok_or_else(|| ApiError(Error::Unconfigured("Search".into())))
}
