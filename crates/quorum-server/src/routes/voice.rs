//! Voice trace endpoints.
//!
//! Voice mode runs browser-to-OpenAI over WebRTC, so the server never
//! sees the audio; the client reports transcripts and tool calls here
//! and the turn aggregator assembles them into per-turn trace records.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::HeaderMap;
use axum::Json;
use quorum_core::types::{
    VoiceEventRequest, VoiceEventResponse, VoiceTraceEndRequest, VoiceTraceEndResponse,
    VoiceTraceStartRequest, VoiceTraceStartResponse,
};

use crate::error::ApiResult;
use crate::routes::admit;
use crate::state::AppState;

/// `POST /v1/voice/trace/start`. The session id doubles as the trace
/// id the client echoes back on every event.
pub async fn start(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<VoiceTraceStartRequest>,
) -> ApiResult<Json<VoiceTraceStartResponse>> {
    let identity = admit(&state, &headers, Some(peer))?;

    if !state.config.trace.enabled {
        return Ok(Json(VoiceTraceStartResponse {
            trace_id: String::new(),
            enabled: false,
        }));
    }

    let trace_id = state.turns.start(&req.session_id, &identity).await;
    Ok(Json(VoiceTraceStartResponse {
        trace_id,
        enabled: true,
    }))
}

/// `POST /v1/voice/trace/event`.
pub async fn event(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<VoiceEventRequest>,
) -> ApiResult<Json<VoiceEventResponse>> {
    admit(&state, &headers, Some(peer))?;

    if state.config.trace.enabled {
        state
            .turns
            .event(&req.trace_id, req.event_type, req.content, req.metadata)
            .await;
    }
    Ok(Json(VoiceEventResponse { success: true }))
}

/// `POST /v1/voice/trace/end`.
pub async fn end(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<VoiceTraceEndRequest>,
) -> ApiResult<Json<VoiceTraceEndResponse>> {
    admit(&state, &headers, Some(peer))?;

    if state.config.trace.enabled {
        state
            .turns
            .end(&req.trace_id, req.duration_ms, req.message_count)
            .await;
    }
    Ok(Json(VoiceTraceEndResponse { success: true }))
}
