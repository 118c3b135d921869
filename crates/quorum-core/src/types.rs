//! Wire types shared between the HTTP surface and the service crates.

use serde::{Deserialize, Serialize};

/// One entry of client-supplied conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Body of `POST /v1/chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_true")]
    pub enable_web_search: bool,
}

fn default_true() -> bool {
    true
}

/// One vector-search hit from the meeting notes store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub text: String,
    pub timestamp: String,
    pub session_info: String,
    pub score: f64,
}

/// Body of `POST /api/upload/youtube`.
#[derive(Debug, Clone, Deserialize)]
pub struct YouTubeUploadRequest {
    pub url: String,
    pub session_info: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_chunk_size() -> usize {
    1000
}

fn default_overlap() -> usize {
    1
}

fn default_language() -> String {
    "en".into()
}

/// Immediate response from the upload endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    pub job_id: String,
    pub status: String,
    pub message: String,
}

/// Response of `GET /api/upload/status/{job_id}`.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub job_id: String,
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `POST /v1/feedback`.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedbackRequest {
    pub trace_id: String,
    /// "like" or "dislike".
    pub rating: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedbackResponse {
    pub success: bool,
    pub message: String,
}

// --- Voice trace wire types ---

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceTraceStartRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceTraceStartResponse {
    pub trace_id: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceEventRequest {
    pub trace_id: String,
    pub event_type: VoiceEventType,
    pub content: String,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Kinds of events the voice client reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceEventType {
    UserTranscript,
    AssistantResponse,
    FunctionCall,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceEventResponse {
    pub success: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VoiceTraceEndRequest {
    pub trace_id: String,
    pub duration_ms: u64,
    pub message_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceTraceEndResponse {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_request_defaults() {
        let req: QuestionRequest =
            serde_json::from_str(r#"{"question": "what happened in November?"}"#).unwrap();
        assert!(req.messages.is_empty());
        assert!(req.enable_web_search);
    }

    #[test]
    fn test_voice_event_type_snake_case() {
        let ev: VoiceEventType = serde_json::from_str(r#""user_transcript""#).unwrap();
        assert_eq!(ev, VoiceEventType::UserTranscript);
        assert_eq!(
            serde_json::to_string(&VoiceEventType::FunctionCall).unwrap(),
            r#""function_call""#
        );
    }
}
