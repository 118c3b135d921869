//! Plain-text event rendering for the agent tool.

use crate::Event;

/// Render a numbered event list the way the chat agent presents it.
pub fn format_event_list(events: &[Event]) -> String {
    let mut blocks = Vec::with_capacity(events.len());

    for (idx, event) in events.iter().enumerate() {
        let mut parts = vec![format!("{}. **{}** (ID: {})", idx + 1, event.name, event.id)];

        if let Some(date) = &event.start_date {
            let mut time = event.start_time.clone().unwrap_or_default();
            if let Some(end) = &event.end_time {
                time = format!("{time} - {end}");
            }
            parts.push(format!("   Date: {date} at {time}"));
        }
        if let Some(location) = &event.location {
            parts.push(format!("   Location: {location}"));
        }
        if let Some(description) = &event.description {
            parts.push(format!("   Description: {description}"));
        }
        if let Some(price) = &event.price {
            parts.push(format!("   Price: {price}"));
            if let Some(available) = event.tickets_available {
                parts.push(format!("   Tickets Available: {available}"));
            }
        } else if event.is_free {
            parts.push("   Price: Free".into());
        }
        if let Some(url) = &event.url {
            parts.push(format!("   Register: {url}"));
        }

        blocks.push(parts.join("\n"));
    }

    blocks.join("\n\n")
}

/// Render a single event with full details.
pub fn format_event_details(event: &Event) -> String {
    let mut parts = vec![format!("**{}**", event.name)];

    if let Some(date) = &event.start_date {
        let mut time = event.start_time.clone().unwrap_or_default();
        if let Some(end) = &event.end_time {
            time = format!("{time} - {end}");
        }
        parts.push(format!("Date: {date} at {time}"));
    }
    if let Some(location) = &event.location {
        parts.push(format!("Location: {location}"));
    }

    if let Some(full) = &event.full_description {
        parts.push(format!("\n**Description:**\n{full}"));
    } else if let Some(description) = &event.description {
        parts.push(format!("\n**Description:**\n{description}"));
    }

    if let Some(agenda) = &event.agenda {
        parts.push("\n**Agenda:**".into());
        for item in agenda {
            parts.push(format!("  - {}: {}", item.time, item.title));
        }
    }

    if let Some(available) = event.tickets_available {
        parts.push(format!("\nTickets Available: {available}"));
    } else if event.is_free {
        parts.push("\nPrice: Free".into());
    }

    if let Some(url) = &event.url {
        parts.push(format!("\nRegister: {url}"));
    }

    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Event {
        Event {
            id: "42".into(),
            name: "AI Meetup".into(),
            description: Some("Monthly gathering".into()),
            start_date: Some("Thursday, March 12, 2026".into()),
            start_time: Some("6:30 PM".into()),
            end_time: Some("9:00 PM".into()),
            location: Some("The Exchange".into()),
            url: Some("https://example.com/e/42".into()),
            is_free: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_list_numbering_and_free_price() {
        let out = format_event_list(&[sample()]);
        assert!(out.starts_with("1. **AI Meetup** (ID: 42)"));
        assert!(out.contains("Date: Thursday, March 12, 2026 at 6:30 PM - 9:00 PM"));
        assert!(out.contains("Price: Free"));
        assert!(out.contains("Register: https://example.com/e/42"));
    }

    #[test]
    fn test_details_prefers_full_description() {
        let mut event = sample();
        event.full_description = Some("The long version".into());
        let out = format_event_details(&event);
        assert!(out.contains("The long version"));
        assert!(!out.contains("Monthly gathering"));
    }
}
