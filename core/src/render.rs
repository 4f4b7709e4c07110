use slide_protocol::SlideDeck;

use crate::error::Result;

/// Turns a deck into an exportable artifact.
pub trait DeckRenderer: Send + Sync {
    /// File extension of the produced artifact, without the dot.
    fn extension(&self) -> &'static str;

    fn render(&self, deck: &SlideDeck, theme: Option<&str>) -> Result<Vec<u8>>;
}

const DEFAULT_HEADING: &str = "Presentation";

#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownRenderer;

impl DeckRenderer for MarkdownRenderer {
    fn extension(&self) -> &'static str {
        "md"
    }

    fn render(&self, deck: &SlideDeck, theme: Option<&str>) -> Result<Vec<u8>> {
        let heading = theme
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_HEADING);

        let mut out = format!("# {heading}\n");
        for (index, slide) in deck.iter().enumerate() {
            out.push_str(&format!("\n## Slide {}: {}\n\n", index + 1, slide.title.trim()));

            let content = slide.content.trim();
            if !content.is_empty() {
                out.push_str(content);
                out.push('\n');
            }

            if let Some(narration) = slide.narration.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                out.push('\n');
                for (i, line) in narration.lines().enumerate() {
                    if i == 0 {
                        out.push_str(&format!("> Notes: {line}\n"));
                    } else {
                        out.push_str(&format!("> {line}\n"));
                    }
                }
            }
        }
        Ok(out.into_bytes())
    }
}
