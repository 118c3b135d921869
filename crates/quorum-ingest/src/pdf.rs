//! PDF slide-deck source.
//!
//! One chunk per non-empty page; page numbers become `Slide N`
//! position labels. Extraction is CPU-bound and runs on the blocking
//! pool.

use async_trait::async_trait;
use tracing::debug;

use crate::worker::ChunkSource;
use crate::SourceChunk;

pub struct PdfSource {
    bytes: Vec<u8>,
    filename: String,
}

impl PdfSource {
    pub fn new(bytes: Vec<u8>, filename: String) -> Self {
        Self { bytes, filename }
    }
}

#[async_trait]
impl ChunkSource for PdfSource {
    fn source_type(&self) -> &str {
        "pdf"
    }

    fn source_id(&self) -> &str {
        &self.filename
    }

    async fn fetch(&self) -> anyhow::Result<Vec<SourceChunk>> {
        let bytes = self.bytes.clone();
        let pages = tokio::task::spawn_blocking(move || {
            pdf_extract::extract_text_from_mem_by_pages(&bytes)
        })
        .await??;

        debug!(filename = %self.filename, pages = pages.len(), "Extracted PDF text");

        Ok(pages_to_chunks(pages))
    }
}

fn pages_to_chunks(pages: Vec<String>) -> Vec<SourceChunk> {
    pages
        .into_iter()
        .enumerate()
        .filter_map(|(idx, page)| {
            let text = normalize_page(&page);
            (!text.is_empty()).then(|| SourceChunk {
                text,
                timestamp: format!("Slide {}", idx + 1),
            })
        })
        .collect()
}

/// Collapse extraction whitespace; blank lines between text runs
/// become single newlines.
fn normalize_page(page: &str) -> String {
    page.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pages_to_chunks_skips_empty_pages() {
        let pages = vec![
            "Title slide\n\nWelcome".to_string(),
            "   \n \n".to_string(),
            "Closing notes".to_string(),
        ];
        let chunks = pages_to_chunks(pages);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Title slide\nWelcome");
        assert_eq!(chunks[0].timestamp, "Slide 1");
        // Page numbering is positional, not compacted
        assert_eq!(chunks[1].timestamp, "Slide 3");
    }

    #[test]
    fn test_normalize_page_trims_lines() {
        assert_eq!(normalize_page("  a  \n\n  b  "), "a\nb");
        assert_eq!(normalize_page(""), "");
    }
}
