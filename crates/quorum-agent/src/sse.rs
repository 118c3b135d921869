//! Incremental SSE (Server-Sent Events) parser.
//!
//! Byte chunks from the network split events arbitrarily; the parser
//! buffers partial lines across chunks and yields complete events.

use futures::Stream;
use tokio_stream::StreamExt;

/// A parsed SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Feed-based SSE line parser. Push raw chunks in, take complete
/// events out.
#[derive(Default)]
pub struct SseParser {
    buffer: String,
    current_event: Option<String>,
    current_data: Vec<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one network chunk and return any events it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.find('\n') {
            let line = self.buffer[..newline].trim_end_matches('\r').to_string();
            self.buffer.drain(..=newline);

            if line.is_empty() {
                // Blank line terminates an event.
                if let Some(event) = self.take_event() {
                    events.push(event);
                }
            } else if line.starts_with(':') {
                // Comment line.
            } else if let Some(value) = line.strip_prefix("event:") {
                self.current_event = Some(value.trim_start().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                self.current_data.push(value.trim_start().to_string());
            }
            // Unknown fields (id:, retry:) are ignored.
        }
        events
    }

    /// Flush any event still pending when the stream ends.
    pub fn finish(&mut self) -> Option<SseEvent> {
        self.take_event()
    }

    fn take_event(&mut self) -> Option<SseEvent> {
        if self.current_data.is_empty() {
            self.current_event = None;
            return None;
        }
        Some(SseEvent {
            event: self.current_event.take(),
            data: std::mem::take(&mut self.current_data).join("\n"),
        })
    }
}

/// Parse a reqwest response body as a stream of SSE events.
pub fn parse_sse_stream(
    response: reqwest::Response,
) -> impl Stream<Item = anyhow::Result<SseEvent>> {
    struct State {
        bytes: std::pin::Pin<
            Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>,
        >,
        parser: SseParser,
        ready: std::collections::VecDeque<SseEvent>,
        done: bool,
    }

    futures::stream::unfold(
        State {
            bytes: Box::pin(response.bytes_stream()),
            parser: SseParser::new(),
            ready: Default::default(),
            done: false,
        },
        |mut state| async move {
            loop {
                if let Some(event) = state.ready.pop_front() {
                    return Some((Ok(event), state));
                }
                if state.done {
                    return None;
                }
                match state.bytes.next().await {
                    Some(Ok(chunk)) => {
                        state.ready.extend(state.parser.push(&chunk));
                    }
                    Some(Err(e)) => {
                        state.done = true;
                        return Some((Err(anyhow::anyhow!("SSE stream error: {e}")), state));
                    }
                    None => {
                        state.done = true;
                        if let Some(event) = state.parser.finish() {
                            state.ready.push_back(event);
                        }
                    }
                }
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: hello\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
        assert!(events[0].event.is_none());
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"event: trace_id\nda").is_empty());
        let events = parser.push(b"ta: abc123\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("trace_id"));
        assert_eq!(events[0].data, "abc123");
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut parser = SseParser::new();
        let events = parser.push(b"data: line1\ndata: line2\n\n");
        assert_eq!(events[0].data, "line1\nline2");
    }

    #[test]
    fn test_comments_and_crlf_ignored() {
        let mut parser = SseParser::new();
        let events = parser.push(b": keepalive\r\ndata: x\r\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_finish_flushes_trailing_event() {
        let mut parser = SseParser::new();
        assert!(parser.push(b"data: tail\n").is_empty());
        let event = parser.finish().unwrap();
        assert_eq!(event.data, "tail");
        assert!(parser.finish().is_none());
    }
}
