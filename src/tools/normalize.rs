//! Turns raw model output into the typed payloads the API returns.
//!
//! Models are asked for strict JSON but regularly wrap it in a fenced code
//! block, return a bare string where a list was requested, or use alternate
//! key names. Everything here is lenient on input and strict on output.

use anyhow::{Context as _, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::models::{AnalysisResult, CompetingPlayer, PresentationDeck, Slide};

pub const MAX_COMPETITORS: usize = 5;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("valid regex"));

pub fn extract_json(text: &str) -> Result<Value> {
    let text = text.trim();
    let body = FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or(text);
    serde_json::from_str(body).context("model response is not valid JSON")
}

pub fn normalize_analysis(raw: &Value) -> AnalysisResult {
    let competing_players = raw
        .get("competing_players")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(normalize_player).take(MAX_COMPETITORS).collect())
        .unwrap_or_default();

    let market_cap_or_target_revenue = match raw.get("market_cap_or_target_revenue") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "Not estimated".to_string(),
    };

    AnalysisResult {
        prompt: None,
        competing_players,
        market_cap_or_target_revenue,
        major_vicinity_locations: string_list(raw.get("major_vicinity_locations")),
        target_audience: string_list(raw.get("target_audience")),
        undiscovered_addons: string_list(raw.get("undiscovered_addons")),
        disclaimer: None,
        suggested_business_name: text_field(raw, &["suggested_business_name"]),
    }
}

fn normalize_player(item: &Value) -> CompetingPlayer {
    match item {
        Value::Object(_) => CompetingPlayer {
            name: text_field(item, &["name"]).unwrap_or_else(|| "Unknown".to_string()),
            description: text_field(item, &["description"]),
            location: text_field(item, &["location"]),
            url: text_field(item, &["url", "website"]),
            strengths: string_list(item.get("strengths")),
            annual_revenue: text_field(item, &["annual_revenue", "revenue"]),
            year_established: text_field(item, &["year_established", "founded", "year_founded"]),
        },
        Value::String(name) => CompetingPlayer {
            name: name.clone(),
            ..Default::default()
        },
        other => CompetingPlayer {
            name: other.to_string(),
            ..Default::default()
        },
    }
}

/// First non-empty value among `keys`; numbers are stringified.
fn text_field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::String(_) | Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Builds a deck from model output.
///
/// Slides are renumbered `1..=N` in the order given. When `expected_slides`
/// is set the deck must have exactly that many: extra slides are dropped and
/// a short deck is an error. A missing duration falls back to
/// `default_minutes`, a missing title to `fallback_title`.
pub fn normalize_deck(
    raw: &Value,
    expected_slides: Option<usize>,
    default_minutes: f64,
    fallback_title: &str,
) -> Result<PresentationDeck> {
    let items = raw
        .get("slides")
        .and_then(Value::as_array)
        .context("model response has no slides")?;

    let limit = expected_slides.unwrap_or(usize::MAX);
    let slides: Vec<Slide> = items
        .iter()
        .filter(|item| item.is_object())
        .take(limit)
        .enumerate()
        .map(|(idx, item)| normalize_slide(item, idx as u32 + 1))
        .collect();

    if slides.is_empty() {
        anyhow::bail!("model response has no usable slides");
    }
    if let Some(expected) = expected_slides {
        if slides.len() < expected {
            anyhow::bail!("model returned {} of {} slides", slides.len(), expected);
        }
    }

    let total_duration_minutes = raw
        .get("total_duration_minutes")
        .and_then(Value::as_f64)
        .filter(|minutes| *minutes > 0.0)
        .unwrap_or(default_minutes);

    Ok(PresentationDeck {
        presentation_title: text_field(raw, &["presentation_title", "title"])
            .unwrap_or_else(|| fallback_title.to_string()),
        generated_tagline: text_field(raw, &["generated_tagline", "tagline"]),
        total_duration_minutes,
        slides,
    })
}

fn normalize_slide(item: &Value, number: u32) -> Slide {
    let content = match item.get("content") {
        Some(Value::String(s)) => s
            .lines()
            .map(|line| line.trim().trim_start_matches(['-', '*', '•']).trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
        other => string_list(other),
    };

    Slide {
        slide_number: number,
        title: text_field(item, &["title"]).unwrap_or_else(|| format!("Slide {number}")),
        subtitle: text_field(item, &["subtitle"]),
        content,
        speaker_notes: text_field(item, &["speaker_notes", "notes"]),
        duration_seconds: item
            .get("duration_seconds")
            .and_then(Value::as_f64)
            .filter(|secs| *secs > 0.0)
            .map(|secs| secs.round() as u32),
        image_search_query: text_field(item, &["image_search_query"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_fenced_code_blocks() {
        let text = "Here you go:\n```json\n{\"a\": 1}\n```\nthanks";
        assert_eq!(extract_json(text).unwrap(), json!({"a": 1}));

        let bare = "```\n[1, 2]\n```";
        assert_eq!(extract_json(bare).unwrap(), json!([1, 2]));
    }

    #[test]
    fn rejects_prose() {
        assert!(extract_json("I could not find competitors.").is_err());
    }

    #[test]
    fn competitors_accept_mixed_shapes() {
        let raw = json!({
            "competing_players": [
                "Poilane",
                {"name": "Du Pain et des Idees", "website": "https://dupain.fr", "founded": 2002, "revenue": "EUR 2M"},
                42,
                {"description": "no name given"}
            ]
        });

        let result = normalize_analysis(&raw);
        let players = &result.competing_players;
        assert_eq!(players.len(), 4);
        assert_eq!(players[0].name, "Poilane");
        assert_eq!(players[1].url.as_deref(), Some("https://dupain.fr"));
        assert_eq!(players[1].year_established.as_deref(), Some("2002"));
        assert_eq!(players[1].annual_revenue.as_deref(), Some("EUR 2M"));
        assert_eq!(players[2].name, "42");
        assert_eq!(players[3].name, "Unknown");
    }

    #[test]
    fn competitors_are_capped() {
        let names: Vec<String> = (0..8).map(|i| format!("Shop {i}")).collect();
        let result = normalize_analysis(&json!({ "competing_players": names }));
        assert_eq!(result.competing_players.len(), MAX_COMPETITORS);
    }

    #[test]
    fn scalar_fields_are_coerced() {
        let result = normalize_analysis(&json!({
            "market_cap_or_target_revenue": 125000,
            "major_vicinity_locations": "Le Marais",
            "target_audience": ["Young professionals", "", "Tourists"],
            "suggested_business_name": "Levain Lumiere"
        }));

        assert_eq!(result.market_cap_or_target_revenue, "125000");
        assert_eq!(result.major_vicinity_locations, vec!["Le Marais"]);
        assert_eq!(result.target_audience, vec!["Young professionals", "Tourists"]);
        assert!(result.undiscovered_addons.is_empty());
        assert_eq!(result.suggested_business_name.as_deref(), Some("Levain Lumiere"));
    }

    #[test]
    fn missing_market_cap_has_placeholder() {
        let result = normalize_analysis(&json!({}));
        assert_eq!(result.market_cap_or_target_revenue, "Not estimated");
        assert!(result.competing_players.is_empty());
    }

    #[test]
    fn deck_is_renumbered_and_truncated() {
        let slides: Vec<Value> = (0..12)
            .map(|i| json!({"slide_number": 40 + i, "title": format!("Part {i}"), "content": ["a", "b"]}))
            .collect();
        let raw = json!({"presentation_title": "Pitch", "slides": slides});

        let deck = normalize_deck(&raw, Some(10), 5.0, "Fallback").unwrap();
        assert_eq!(deck.slide_count(), 10);
        let numbers: Vec<u32> = deck.slides.iter().map(|s| s.slide_number).collect();
        assert_eq!(numbers, (1..=10).collect::<Vec<_>>());
        assert_eq!(deck.total_duration_minutes, 5.0);
        assert_eq!(deck.presentation_title, "Pitch");
    }

    #[test]
    fn short_deck_is_an_error_when_a_count_is_requested() {
        let slides: Vec<Value> = (0..3).map(|i| json!({"title": format!("Part {i}")})).collect();
        let raw = json!({"slides": slides});

        let err = normalize_deck(&raw, Some(10), 5.0, "x").unwrap_err();
        assert_eq!(err.to_string(), "model returned 3 of 10 slides");
        assert_eq!(normalize_deck(&raw, Some(3), 5.0, "x").unwrap().slide_count(), 3);
        assert_eq!(normalize_deck(&raw, None, 5.0, "x").unwrap().slide_count(), 3);
    }

    #[test]
    fn slide_content_string_becomes_bullets() {
        let raw = json!({
            "total_duration_minutes": 7,
            "slides": [{"content": "- Fresh bread daily\n- Organic flour\n\n"}]
        });

        let deck = normalize_deck(&raw, None, 5.0, "Fallback").unwrap();
        assert_eq!(deck.presentation_title, "Fallback");
        assert_eq!(deck.total_duration_minutes, 7.0);
        assert_eq!(deck.slides[0].title, "Slide 1");
        assert_eq!(deck.slides[0].content, vec!["Fresh bread daily", "Organic flour"]);
    }

    #[test]
    fn deck_without_slides_is_an_error() {
        assert!(normalize_deck(&json!({"slides": []}), None, 5.0, "x").is_err());
        assert!(normalize_deck(&json!({"title": "x"}), None, 5.0, "x").is_err());
    }
}
