//! Agent tools — the fixed tool set exposed to the LLM.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use quorum_events::format::{format_event_details, format_event_list};
use quorum_events::EventsService;
use quorum_rag::RagService;

/// A capability exposed to the LLM during an agent run.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as exposed to the LLM.
    fn name(&self) -> &str;

    /// Human-readable description for the LLM.
    fn description(&self) -> &str;

    /// JSON Schema describing the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Execute with the model-supplied arguments, returning text the
    /// model reads back.
    async fn execute(&self, params: Value) -> anyhow::Result<String>;
}

/// Build the OpenAI tool definition for a [`Tool`].
pub fn to_llm_tool(tool: &dyn Tool) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name(),
            "description": tool.description(),
            "parameters": tool.parameters_schema(),
        }
    })
}

// --- search_meeting_notes ---

pub struct SearchNotesTool {
    rag: Arc<RagService>,
}

impl SearchNotesTool {
    pub fn new(rag: Arc<RagService>) -> Self {
        Self { rag }
    }
}

#[derive(Deserialize)]
struct SearchParams {
    query: String,
    #[serde(default = "default_top_k")]
    top_k: usize,
    #[serde(default)]
    session_filter: Option<String>,
}

fn default_top_k() -> usize {
    5
}

#[async_trait]
impl Tool for SearchNotesTool {
    fn name(&self) -> &str {
        "search_meeting_notes"
    }

    fn description(&self) -> &str {
        "Search community meeting notes for relevant information. Use session_filter to narrow \
         results by session name, e.g. \"August 2025\", \"Breakout\", \"General meetup\"."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "top_k": {
                    "type": "integer",
                    "description": "Number of top results to return (default: 5)"
                },
                "session_filter": {
                    "type": "string",
                    "description": "Optional filter to narrow results by session name, month, year, or event type"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<String> {
        let p: SearchParams = serde_json::from_value(params)?;
        debug!(query = %p.query, "search_meeting_notes");

        let hits = self
            .rag
            .search(&p.query, p.top_k, p.session_filter.as_deref())
            .await?;

        if hits.is_empty() {
            return Ok(match p.session_filter {
                Some(filter) => format!(
                    "No relevant meeting notes found for this query with session filter '{filter}'."
                ),
                None => "No relevant meeting notes found for this query.".into(),
            });
        }

        let formatted: Vec<String> = hits
            .iter()
            .enumerate()
            .map(|(idx, hit)| {
                format!(
                    "{}. [Session: {}, Timestamp: {}, Score: {:.3}]\n   {}",
                    idx + 1,
                    hit.session_info,
                    hit.timestamp,
                    hit.score,
                    hit.text
                )
            })
            .collect();

        Ok(formatted.join("\n\n"))
    }
}

// --- eventbrite ---

pub struct EventbriteTool {
    events: Arc<EventsService>,
}

impl EventbriteTool {
    pub fn new(events: Arc<EventsService>) -> Self {
        Self { events }
    }
}

#[derive(Deserialize)]
struct EventbriteParams {
    action: String,
    #[serde(default = "default_event_limit")]
    limit: usize,
    #[serde(default)]
    event_id: Option<String>,
}

fn default_event_limit() -> usize {
    3
}

#[async_trait]
impl Tool for EventbriteTool {
    fn name(&self) -> &str {
        "eventbrite"
    }

    fn description(&self) -> &str {
        "Get community events from Eventbrite. Use when users ask about upcoming events, the \
         next meetup, registration, tickets, topics, speakers, venue, or full details of a \
         specific event. Action \"list\" returns upcoming events; \"details\" returns full \
         information for one event."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "enum": ["list", "details"],
                    "description": "\"list\" for upcoming events, \"details\" for one event"
                },
                "limit": {
                    "type": "integer",
                    "description": "For list: number of events to return (default: 3)"
                },
                "event_id": {
                    "type": "string",
                    "description": "For details: the event ID"
                }
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<String> {
        let p: EventbriteParams = serde_json::from_value(params)?;
        debug!(action = %p.action, "eventbrite");

        if p.action == "details" {
            let Some(event_id) = p.event_id else {
                return Ok("Error: event_id is required for details action".into());
            };
            return Ok(match self.events.details(&event_id).await? {
                Some(event) => format_event_details(&event),
                None => format!("Event {event_id} not found."),
            });
        }

        let events = self.events.upcoming(p.limit).await?;
        if events.is_empty() {
            return Ok(
                "No upcoming events found. Check back later or visit the community Eventbrite page."
                    .into(),
            );
        }
        Ok(format_event_list(&events))
    }
}

// --- web_search ---

/// External search API wrapper (SearXNG or Brave, detected by URL).
pub struct WebSearchTool {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl WebSearchTool {
    pub fn new(base_url: String, api_key: Option<String>) -> anyhow::Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()?,
            base_url,
            api_key,
        })
    }
}

#[derive(Deserialize)]
struct WebSearchParams {
    query: String,
    #[serde(default = "default_num_results")]
    num_results: usize,
}

fn default_num_results() -> usize {
    5
}

fn parse_searxng_results(body: &Value, max: usize) -> Vec<String> {
    let empty = vec![];
    body["results"]
        .as_array()
        .unwrap_or(&empty)
        .iter()
        .take(max)
        .filter_map(|r| {
            Some(format!(
                "{} ({})\n{}",
                r["title"].as_str()?,
                r["url"].as_str()?,
                r["content"].as_str().unwrap_or("")
            ))
        })
        .collect()
}

fn parse_brave_results(body: &Value, max: usize) -> Vec<String> {
    let empty = vec![];
    body["web"]["results"]
        .as_array()
        .unwrap_or(&empty)
        .iter()
        .take(max)
        .filter_map(|r| {
            Some(format!(
                "{} ({})\n{}",
                r["title"].as_str()?,
                r["url"].as_str()?,
                r["description"].as_str().unwrap_or("")
            ))
        })
        .collect()
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information not covered by the meeting notes. Returns a list of \
         results with title, URL, and snippet."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results (default: 5)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> anyhow::Result<String> {
        let p: WebSearchParams = serde_json::from_value(params)?;
        debug!(query = %p.query, "web_search");

        let is_brave = self.base_url.contains("brave.com");
        let response = if is_brave {
            self.client
                .get(format!("{}/res/v1/web/search", self.base_url))
                .header(
                    "X-Subscription-Token",
                    self.api_key.clone().unwrap_or_default(),
                )
                .query(&[("q", &p.query), ("count", &p.num_results.to_string())])
                .send()
                .await?
        } else {
            self.client
                .get(format!("{}/search", self.base_url))
                .query(&[("q", p.query.as_str()), ("format", "json")])
                .send()
                .await?
        };

        if !response.status().is_success() {
            anyhow::bail!("search API returned {}", response.status());
        }

        let body: Value = response.json().await?;
        let results = if is_brave {
            parse_brave_results(&body, p.num_results)
        } else {
            parse_searxng_results(&body, p.num_results)
        };

        if results.is_empty() {
            return Ok("No web results found.".into());
        }
        Ok(results.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_llm_tool_shape() {
        struct Dummy;

        #[async_trait]
        impl Tool for Dummy {
            fn name(&self) -> &str {
                "dummy"
            }
            fn description(&self) -> &str {
                "d"
            }
            fn parameters_schema(&self) -> Value {
                serde_json::json!({"type": "object"})
            }
            async fn execute(&self, _params: Value) -> anyhow::Result<String> {
                Ok("ok".into())
            }
        }

        let def = to_llm_tool(&Dummy);
        assert_eq!(def["type"], "function");
        assert_eq!(def["function"]["name"], "dummy");
    }

    #[test]
    fn test_parse_searxng_results() {
        let body = serde_json::json!({
            "results": [
                {"title": "T1", "url": "https://a", "content": "c1"},
                {"title": "T2", "url": "https://b", "content": "c2"},
            ]
        });
        let results = parse_searxng_results(&body, 1);
        assert_eq!(results.len(), 1);
        assert!(results[0].contains("T1"));
    }
}
