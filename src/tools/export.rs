use std::fmt::Write as _;

use anyhow::Result;

use crate::models::PresentationDeck;

#[derive(Debug, Clone)]
pub struct ExportedDeck {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportedDeck {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

/// Renders a deck into a downloadable document.
pub trait DeckExporter: Send + Sync {
    fn export(&self, deck: &PresentationDeck, business_name: &str) -> Result<ExportedDeck>;
}

/// Speaker-ready Markdown outline: one section per slide, bullets, notes and
/// timing.
pub struct MarkdownExporter;

impl DeckExporter for MarkdownExporter {
    fn export(&self, deck: &PresentationDeck, business_name: &str) -> Result<ExportedDeck> {
        let mut out = String::new();

        let title = if deck.presentation_title.trim().is_empty() {
            business_name
        } else {
            deck.presentation_title.as_str()
        };
        writeln!(out, "# {title}")?;
        if let Some(tagline) = deck.generated_tagline.as_deref().filter(|t| !t.is_empty()) {
            writeln!(out, "\n_{tagline}_")?;
        }
        writeln!(
            out,
            "\n{} slides, {} minutes",
            deck.slide_count(),
            format_minutes(deck.total_duration_minutes)
        )?;

        for slide in &deck.slides {
            writeln!(out, "\n---\n\n## {}. {}", slide.slide_number, slide.title)?;
            if let Some(subtitle) = slide.subtitle.as_deref().filter(|s| !s.is_empty()) {
                writeln!(out, "\n### {subtitle}")?;
            }
            if !slide.content.is_empty() {
                writeln!(out)?;
                for bullet in &slide.content {
                    writeln!(out, "- {bullet}")?;
                }
            }
            if let Some(notes) = slide.speaker_notes.as_deref().filter(|n| !n.is_empty()) {
                writeln!(out, "\n> Speaker notes: {notes}")?;
            }
            if let Some(secs) = slide.duration_seconds {
                writeln!(out, "\n_Timing: {secs}s_")?;
            }
        }

        writeln!(out, "\n---\n\n## Thank you")?;

        Ok(ExportedDeck {
            filename: format!("{}-pitch-deck.md", file_stem(business_name)),
            content_type: "text/markdown; charset=utf-8",
            bytes: out.into_bytes(),
        })
    }
}

fn format_minutes(minutes: f64) -> String {
    if minutes.fract() == 0.0 {
        format!("{}", minutes as i64)
    } else {
        format!("{minutes:.1}")
    }
}

/// Filesystem- and header-safe stem derived from the business name.
pub fn file_stem(business_name: &str) -> String {
    let stem: String = business_name
        .trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect();
    let stem = stem
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if stem.is_empty() {
        "presentation".to_string()
    } else {
        stem
    }
}
