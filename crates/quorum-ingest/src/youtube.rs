//! YouTube transcript source.
//!
//! Pulls the public caption track via the `timedtext` endpoint and
//! splits it into overlapping chunks sized for embedding.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::worker::ChunkSource;
use crate::SourceChunk;

pub struct YouTubeSource {
    client: reqwest::Client,
    video_id: String,
    language: String,
    chunk_size: usize,
    overlap: usize,
}

impl YouTubeSource {
    pub fn new(
        url: &str,
        language: String,
        chunk_size: usize,
        overlap: usize,
    ) -> anyhow::Result<Self> {
        let video_id = extract_video_id(url)
            .ok_or_else(|| anyhow::anyhow!("could not extract a video id from '{url}'"))?;
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            video_id,
            language,
            chunk_size,
            overlap,
        })
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }
}

#[async_trait]
impl ChunkSource for YouTubeSource {
    fn source_type(&self) -> &str {
        "youtube"
    }

    fn source_id(&self) -> &str {
        &self.video_id
    }

    async fn fetch(&self) -> anyhow::Result<Vec<SourceChunk>> {
        let response = self
            .client
            .get("https://www.youtube.com/api/timedtext")
            .query(&[
                ("v", self.video_id.as_str()),
                ("lang", self.language.as_str()),
                ("fmt", "json3"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("timedtext returned {}", response.status());
        }
        let body = response.text().await?;
        if body.trim().is_empty() {
            anyhow::bail!(
                "no '{}' transcript available for video {}",
                self.language,
                self.video_id
            );
        }

        let track: Timedtext = serde_json::from_str(&body)?;
        let segments = track.segments();
        debug!(video_id = %self.video_id, segments = segments.len(), "Fetched transcript");
        if segments.is_empty() {
            anyhow::bail!("transcript for video {} is empty", self.video_id);
        }

        Ok(chunk_segments(&segments, self.chunk_size, self.overlap))
    }
}

#[derive(Deserialize)]
struct Timedtext {
    #[serde(default)]
    events: Vec<TimedtextEvent>,
}

#[derive(Deserialize)]
struct TimedtextEvent {
    #[serde(rename = "tStartMs", default)]
    t_start_ms: u64,
    #[serde(default)]
    segs: Vec<TimedtextSeg>,
}

#[derive(Deserialize)]
struct TimedtextSeg {
    #[serde(default)]
    utf8: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start_ms: u64,
    pub text: String,
}

impl Timedtext {
    fn segments(&self) -> Vec<Segment> {
        self.events
            .iter()
            .filter_map(|event| {
                let text: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
                let text = text.replace('\n', " ").trim().to_string();
                (!text.is_empty()).then_some(Segment {
                    start_ms: event.t_start_ms,
                    text,
                })
            })
            .collect()
    }
}

/// Accept full watch URLs, short links, shorts/embed paths, and bare
/// 11-character video ids.
pub fn extract_video_id(input: &str) -> Option<String> {
    let input = input.trim();

    if let Some(rest) = input.split("youtu.be/").nth(1) {
        return first_id_token(rest);
    }
    for marker in ["/shorts/", "/embed/", "/live/"] {
        if let Some(rest) = input.split(marker).nth(1) {
            return first_id_token(rest);
        }
    }
    if input.contains("youtube.com") {
        let query = input.split('?').nth(1)?;
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("v=") {
                return first_id_token(value);
            }
        }
        return None;
    }

    is_video_id(input).then(|| input.to_string())
}

fn first_id_token(rest: &str) -> Option<String> {
    let token: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    is_video_id(&token).then_some(token)
}

fn is_video_id(s: &str) -> bool {
    s.len() == 11
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn format_timestamp(ms: u64) -> String {
    let total_secs = ms / 1000;
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}

/// Group segments into chunks of roughly `chunk_size` characters,
/// carrying the trailing `overlap` segments into the next chunk so
/// sentences cut at a boundary stay searchable.
pub fn chunk_segments(segments: &[Segment], chunk_size: usize, overlap: usize) -> Vec<SourceChunk> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut current: Vec<&Segment> = Vec::new();
    let mut current_len = 0usize;

    for segment in segments {
        current_len += segment.text.len() + 1;
        current.push(segment);

        if current_len >= chunk_size {
            chunks.push(build_chunk(&current));
            let keep = current.len().saturating_sub(overlap.min(current.len() - 1));
            current.drain(..keep);
            current_len = current.iter().map(|s| s.text.len() + 1).sum();
        }
    }

    // Flush the tail unless it is pure overlap of the last chunk
    if !current.is_empty() && (chunks.is_empty() || current.len() > overlap) {
        chunks.push(build_chunk(&current));
    }

    chunks
}

fn build_chunk(segments: &[&Segment]) -> SourceChunk {
    let text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    SourceChunk {
        text,
        timestamp: format_timestamp(segments[0].start_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id_forms() {
        let cases = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?list=PL123&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=42",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "dQw4w9WgXcQ",
        ];
        for case in cases {
            assert_eq!(
                extract_video_id(case).as_deref(),
                Some("dQw4w9WgXcQ"),
                "failed on {case}"
            );
        }
    }

    #[test]
    fn test_extract_video_id_rejects_garbage() {
        assert!(extract_video_id("https://example.com/watch?v=abc").is_none());
        assert!(extract_video_id("not a url").is_none());
        assert!(extract_video_id("https://www.youtube.com/watch?x=1").is_none());
    }

    #[test]
    fn test_timestamp_format() {
        assert_eq!(format_timestamp(0), "00:00");
        assert_eq!(format_timestamp(65_000), "01:05");
        assert_eq!(format_timestamp(3_725_000), "62:05");
    }

    fn seg(start_ms: u64, text: &str) -> Segment {
        Segment {
            start_ms,
            text: text.into(),
        }
    }

    #[test]
    fn test_chunking_with_overlap() {
        let segments = vec![
            seg(0, "aaaa"),
            seg(1000, "bbbb"),
            seg(2000, "cccc"),
            seg(3000, "dddd"),
        ];
        let chunks = chunk_segments(&segments, 10, 1);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "aaaa bbbb");
        assert_eq!(chunks[0].timestamp, "00:00");
        // Last segment of each chunk leads the next
        assert_eq!(chunks[1].text, "bbbb cccc");
        assert_eq!(chunks[1].timestamp, "00:01");
        assert_eq!(chunks[2].text, "cccc dddd");
        assert_eq!(chunks[2].timestamp, "00:02");
    }

    #[test]
    fn test_short_transcript_is_one_chunk() {
        let segments = vec![seg(5000, "hello world")];
        let chunks = chunk_segments(&segments, 1000, 1);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "hello world");
        assert_eq!(chunks[0].timestamp, "00:05");
    }

    #[test]
    fn test_timedtext_parse_skips_empty_events() {
        let body = r#"{
            "events": [
                {"tStartMs": 0, "segs": [{"utf8": "Hello "}, {"utf8": "there"}]},
                {"tStartMs": 1200},
                {"tStartMs": 2400, "segs": [{"utf8": "\n"}]},
                {"tStartMs": 3600, "segs": [{"utf8": "General Kenobi"}]}
            ]
        }"#;
        let track: Timedtext = serde_json::from_str(body).unwrap();
        let segments = track.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello there");
        assert_eq!(segments[1].start_ms, 3600);
    }
}
