//! Eventbrite integration — thin client plus response shaping.
//!
//! The raw Eventbrite API payloads are verbose; this crate flattens
//! them into [`Event`] records the agent tool and the `/v1/events`
//! endpoint can hand straight to consumers.

pub mod format;

use chrono::NaiveDateTime;
use quorum_core::config::EventbriteConfig;
use quorum_core::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const EVENTBRITE_BASE_URL: &str = "https://www.eventbriteapi.com/v3";

/// A flattened Eventbrite event.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tickets_available: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub is_free: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agenda: Option<Vec<AgendaItem>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaItem {
    pub time: String,
    pub title: String,
}

/// Eventbrite API client.
pub struct EventsService {
    client: reqwest::Client,
    api_token: String,
    org_id: String,
}

impl EventsService {
    pub fn from_config(config: Option<&EventbriteConfig>) -> Result<Self> {
        let config = config.ok_or_else(|| Error::Unconfigured("Eventbrite".into()))?;

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .map_err(|e| Error::Upstream(e.to_string()))?,
            api_token: config.api_token.clone(),
            org_id: config.org_id.clone(),
        })
    }

    /// Fetch upcoming live events for the organization.
    pub async fn upcoming(&self, limit: usize) -> Result<Vec<Event>> {
        let response = self
            .client
            .get(format!(
                "{EVENTBRITE_BASE_URL}/organizations/{}/events/",
                self.org_id
            ))
            .query(&[
                ("token", self.api_token.as_str()),
                ("status", "live"),
                ("time_filter", "current_future"),
                ("expand", "venue,ticket_classes"),
                ("order_by", "start_asc"),
                ("page_size", &limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Eventbrite list: {e}")))?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "Eventbrite list returned non-200");
            return Ok(Vec::new());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Eventbrite list parse: {e}")))?;

        let empty = vec![];
        let events = body["events"].as_array().unwrap_or(&empty);
        Ok(events.iter().map(transform_event).collect())
    }

    /// Fetch one event including its structured content (full
    /// description and agenda when published).
    pub async fn details(&self, event_id: &str) -> Result<Option<Event>> {
        let response = self
            .client
            .get(format!("{EVENTBRITE_BASE_URL}/events/{event_id}/"))
            .query(&[
                ("token", self.api_token.as_str()),
                ("expand", "venue,ticket_classes"),
            ])
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Eventbrite details: {e}")))?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let raw: Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Eventbrite details parse: {e}")))?;
        let mut event = transform_event(&raw);

        let content_response = self
            .client
            .get(format!(
                "{EVENTBRITE_BASE_URL}/events/{event_id}/structured_content/"
            ))
            .query(&[("token", self.api_token.as_str())])
            .send()
            .await;

        if let Ok(resp) = content_response {
            if resp.status().is_success() {
                if let Ok(content) = resp.json::<Value>().await {
                    event.full_description = extract_structured_text(&content);
                    event.agenda = extract_agenda(&content);
                }
            }
        }

        Ok(Some(event))
    }
}

/// Flatten one raw Eventbrite event payload.
fn transform_event(event: &Value) -> Event {
    let start = parse_local_datetime(event["start"]["local"].as_str());
    let end = parse_local_datetime(event["end"]["local"].as_str());

    let description = event["description"]["text"]
        .as_str()
        .map(strip_html)
        .filter(|d| !d.is_empty())
        .map(|d| truncate(&d, 500));

    let tickets = ticket_info(event["ticket_classes"].as_array());

    Event {
        id: event["id"].as_str().unwrap_or_default().to_string(),
        name: event["name"]["text"].as_str().unwrap_or_default().to_string(),
        description,
        start_date: start.map(|dt| dt.format("%A, %B %d, %Y").to_string()),
        start_time: start.map(format_time),
        end_time: end.map(format_time),
        location: format_location(&event["venue"]),
        url: event["url"].as_str().map(String::from),
        tickets_available: tickets.available,
        price: tickets.price,
        is_free: event["is_free"].as_bool().unwrap_or(false),
        full_description: None,
        agenda: None,
    }
}

struct TicketInfo {
    available: Option<i64>,
    price: Option<String>,
}

fn ticket_info(ticket_classes: Option<&Vec<Value>>) -> TicketInfo {
    let mut total_available: i64 = 0;
    let mut lowest_display: Option<String> = None;
    let mut lowest_value = i64::MAX;

    for ticket in ticket_classes.map(|v| v.as_slice()).unwrap_or_default() {
        if ticket["hidden"].as_bool().unwrap_or(false)
            || ticket["hidden_currently"].as_bool().unwrap_or(false)
        {
            continue;
        }
        if ticket["on_sale_status"].as_str() != Some("AVAILABLE") {
            continue;
        }

        let quantity_total = ticket["quantity_total"].as_i64().unwrap_or(0);
        let quantity_sold = ticket["quantity_sold"].as_i64().unwrap_or(0);
        total_available += quantity_total - quantity_sold;

        if ticket["free"].as_bool().unwrap_or(false) {
            lowest_display = Some("Free".into());
            lowest_value = 0;
        } else {
            let value = ticket["cost"]["value"].as_i64().unwrap_or(0);
            if value < lowest_value {
                lowest_value = value;
                lowest_display = ticket["cost"]["display"].as_str().map(String::from);
            }
        }
    }

    TicketInfo {
        available: (total_available > 0).then_some(total_available),
        price: lowest_display,
    }
}

fn parse_local_datetime(value: Option<&str>) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value?, "%Y-%m-%dT%H:%M:%S").ok()
}

fn format_time(dt: NaiveDateTime) -> String {
    // "07:00 PM" -> "7:00 PM", matching the site's display style
    dt.format("%I:%M %p")
        .to_string()
        .trim_start_matches('0')
        .to_string()
}

fn format_location(venue: &Value) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(name) = venue["name"].as_str() {
        parts.push(name.to_string());
    }
    if let Some(addr) = venue["address"]["localized_address_display"].as_str() {
        parts.push(addr.to_string());
    }
    (!parts.is_empty()).then(|| parts.join(", "))
}

/// Drop HTML tags and collapse whitespace.
fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect()
}

fn extract_structured_text(content: &Value) -> Option<String> {
    for module in content["modules"].as_array()? {
        if module["type"].as_str() == Some("text") {
            let html = module["data"]["body"]["text"].as_str().unwrap_or_default();
            if !html.is_empty() {
                return Some(strip_html(html));
            }
        }
    }
    None
}

fn extract_agenda(content: &Value) -> Option<Vec<AgendaItem>> {
    for widget in content["widgets"].as_array()? {
        if widget["type"].as_str() == Some("agenda") {
            let tabs = widget["data"]["tabs"].as_array()?;
            let slots = tabs.first()?["slots"].as_array()?;
            return Some(
                slots
                    .iter()
                    .map(|slot| AgendaItem {
                        time: format!(
                            "{} - {}",
                            slot["startTime"].as_str().unwrap_or_default(),
                            slot["endTime"].as_str().unwrap_or_default()
                        ),
                        title: slot["title"].as_str().unwrap_or_default().to_string(),
                    })
                    .collect(),
            );
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Hello   <b>world</b></p>\n<br/>again"),
            "Hello world again"
        );
    }

    #[test]
    fn test_transform_event_basics() {
        let raw = json!({
            "id": "123",
            "name": {"text": "March Meetup"},
            "description": {"text": "<p>An evening of talks</p>"},
            "start": {"local": "2026-03-12T18:30:00"},
            "end": {"local": "2026-03-12T21:00:00"},
            "url": "https://example.com/e/123",
            "is_free": true,
            "venue": {
                "name": "The Exchange",
                "address": {"localized_address_display": "1 Main St, Birmingham"}
            },
            "ticket_classes": [
                {
                    "on_sale_status": "AVAILABLE",
                    "free": true,
                    "quantity_total": 100,
                    "quantity_sold": 40
                },
                {"hidden": true, "on_sale_status": "AVAILABLE", "quantity_total": 10, "quantity_sold": 0}
            ]
        });

        let event = transform_event(&raw);
        assert_eq!(event.id, "123");
        assert_eq!(event.name, "March Meetup");
        assert_eq!(event.description.as_deref(), Some("An evening of talks"));
        assert_eq!(event.start_date.as_deref(), Some("Thursday, March 12, 2026"));
        assert_eq!(event.start_time.as_deref(), Some("6:30 PM"));
        assert_eq!(
            event.location.as_deref(),
            Some("The Exchange, 1 Main St, Birmingham")
        );
        // Hidden ticket class is excluded from availability
        assert_eq!(event.tickets_available, Some(60));
        assert_eq!(event.price.as_deref(), Some("Free"));
        assert!(event.is_free);
    }

    #[test]
    fn test_agenda_extraction() {
        let content = json!({
            "widgets": [{
                "type": "agenda",
                "data": {"tabs": [{"slots": [
                    {"startTime": "18:30", "endTime": "19:00", "title": "Doors + pizza"},
                    {"startTime": "19:00", "endTime": "19:45", "title": "Lightning talks"}
                ]}]}
            }]
        });

        let agenda = extract_agenda(&content).unwrap();
        assert_eq!(agenda.len(), 2);
        assert_eq!(agenda[0].time, "18:30 - 19:00");
        assert_eq!(agenda[1].title, "Lightning talks");
    }
}
