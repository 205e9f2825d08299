use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::presentation::DeckFlow;
use super::store::{keys, load_json, save_json, KeyValueStore};
use super::video::VideoFlow;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorChoice {
    #[default]
    Deck,
    Video,
}

impl FromStr for GeneratorChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deck" | "presentation" => Ok(GeneratorChoice::Deck),
            "video" => Ok(GeneratorChoice::Video),
            other => Err(format!("Unknown generator '{other}', expected deck or video")),
        }
    }
}

impl fmt::Display for GeneratorChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorChoice::Deck => f.write_str("deck"),
            GeneratorChoice::Video => f.write_str("video"),
        }
    }
}

/// The final stage. Both generators live side by side; switching between them
/// keeps whatever either one has produced.
pub struct PitchStage {
    store: Arc<dyn KeyValueStore>,
    choice: GeneratorChoice,
    deck: DeckFlow,
    video: VideoFlow,
}

impl PitchStage {
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let choice = load_json(store.as_ref(), keys::GENERATOR).unwrap_or_default();
        Self {
            deck: DeckFlow::open(store.clone()),
            video: VideoFlow::open(store.clone()),
            choice,
            store,
        }
    }

    pub fn choice(&self) -> GeneratorChoice {
        self.choice
    }

    pub fn choose(&mut self, choice: GeneratorChoice) {
        self.choice = choice;
        save_json(self.store.as_ref(), keys::GENERATOR, &choice);
    }

    pub fn deck(&self) -> &DeckFlow {
        &self.deck
    }

    pub fn deck_mut(&mut self) -> &mut DeckFlow {
        &mut self.deck
    }

    pub fn video(&self) -> &VideoFlow {
        &self.video
    }

    pub fn video_mut(&mut self) -> &mut VideoFlow {
        &mut self.video
    }
}
