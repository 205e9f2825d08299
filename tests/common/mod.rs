#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::json;

use raw2ready::server::AppState;
use raw2ready::tools::llm::{CompletionBackend, ModelRouter, ANALYST_PREAMBLE};
use raw2ready::tools::video::VideoProvider;

/// Stands in for the model providers: analysis prompts get a fenced JSON
/// analysis, deck prompts a twelve slide deck, edit prompts a three slide deck.
pub struct Scripted;

#[async_trait]
impl CompletionBackend for Scripted {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        if system == ANALYST_PREAMBLE {
            return Ok(format!("```json\n{}\n```", analysis_json()));
        }
        if prompt.contains("Apply this change request") {
            return Ok(deck_json(3).to_string());
        }
        Ok(deck_json(12).to_string())
    }
}

/// Answers every prompt with a deck of a fixed size.
pub struct FixedDeck(pub u32);

#[async_trait]
impl CompletionBackend for FixedDeck {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
        Ok(deck_json(self.0).to_string())
    }
}

pub struct Failing(pub &'static str);

#[async_trait]
impl CompletionBackend for Failing {
    async fn complete(&self, _system: &str, _prompt: &str) -> Result<String> {
        Err(anyhow!(self.0))
    }
}

/// Records what it was asked for and answers with a fixed URL.
#[derive(Default)]
pub struct RecordingVideo {
    pub calls: Mutex<Vec<(String, f64)>>,
}

#[async_trait]
impl VideoProvider for RecordingVideo {
    async fn generate(&self, prompt: &str, duration_seconds: f64) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), duration_seconds));
        Ok("https://cdn.test/videos/pain-paris.mp4".to_string())
    }
}

pub fn scripted_state() -> AppState {
    AppState::new(Arc::new(ModelRouter::fixed(Arc::new(Scripted))), "chatgpt-latest")
}

pub fn analysis_json() -> serde_json::Value {
    json!({
        "competing_players": [
            {
                "name": "Du Pain et des Idees",
                "description": "Award-winning artisan bakery",
                "location": "Paris 10e",
                "website": "https://dupainetdesidees.com",
                "strengths": ["Signature pastries", "Tourist traffic"],
                "founded": 2002
            },
            "Poilane"
        ],
        "market_cap_or_target_revenue": 450000,
        "major_vicinity_locations": ["Canal Saint-Martin", "Le Marais"],
        "target_audience": "Health-conscious locals",
        "undiscovered_addons": ["Sourdough workshops"]
    })
}

pub fn deck_json(slides: u32) -> serde_json::Value {
    let slides: Vec<_> = (0..slides)
        .map(|i| {
            json!({
                "slide_number": i * 2 + 7,
                "title": format!("Slide {}", i + 1),
                "content": ["First point", "Second point"],
                "speaker_notes": "Keep it short",
                "duration_seconds": 30
            })
        })
        .collect();
    json!({
        "presentation_title": "Pain Paris",
        "generated_tagline": "Bread the slow way",
        "slides": slides
    })
}

pub fn analyze_body(model: &str) -> serde_json::Value {
    json!({
        "business_name": "My Business",
        "location_city": "Paris",
        "country": "France",
        "raw_idea": "organic bakery",
        "model_selection": model,
        "time_commitment": "full-time",
        "budget": null
    })
}
