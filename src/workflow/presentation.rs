use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::api::{ApiClient, ExportedFile};
use super::store::{keys, load_json, save_json, KeyValueStore};
use super::Validation;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{
    BusinessContext, EditPresentationRequest, ExportPresentationRequest,
    GeneratePresentationRequest, PresentationDeck, Slide,
};
use crate::server::{DECK_MINUTES_RANGE as MINUTES, SLIDE_RANGE as SLIDES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckInputs {
    pub num_slides: u32,
    pub duration_minutes: u32,
}

impl Default for DeckInputs {
    fn default() -> Self {
        Self {
            num_slides: 10,
            duration_minutes: 5,
        }
    }
}

impl DeckInputs {
    pub fn validate(&self) -> Validation {
        let mut validation = Validation::default();
        if !SLIDES.contains(&self.num_slides) {
            validation.reject(
                "num_slides",
                format!("Number of slides must be between {} and {}", SLIDES.start(), SLIDES.end()),
            );
        }
        if !MINUTES.contains(&self.duration_minutes) {
            validation.reject(
                "duration_minutes",
                format!("Duration must be between {} and {} minutes", MINUTES.start(), MINUTES.end()),
            );
        }
        validation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckPhase {
    Idle,
    Generating,
    Viewing,
    Editing,
}

/// Slide deck generation, viewing and editing.
pub struct DeckFlow {
    store: Arc<dyn KeyValueStore>,
    inputs: DeckInputs,
    deck: Option<PresentationDeck>,
    slide_index: usize,
    phase: DeckPhase,
    edit_instruction: String,
    error: Option<String>,
}

impl DeckFlow {
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let inputs = load_json(store.as_ref(), keys::PRESENTATION_FORM).unwrap_or_default();
        let deck: Option<PresentationDeck> =
            load_json(store.as_ref(), keys::DECK).filter(|d: &PresentationDeck| !d.slides.is_empty());
        let slide_index = match &deck {
            Some(deck) => load_json::<usize>(store.as_ref(), keys::SLIDE_INDEX)
                .unwrap_or(0)
                .min(deck.slide_count() - 1),
            None => 0,
        };
        let phase = if deck.is_some() { DeckPhase::Viewing } else { DeckPhase::Idle };

        Self {
            store,
            inputs,
            deck,
            slide_index,
            phase,
            edit_instruction: String::new(),
            error: None,
        }
    }

    pub fn inputs(&self) -> DeckInputs {
        self.inputs
    }

    /// Stores new inputs as typed; validity is only checked on generate.
    pub fn set_inputs(&mut self, inputs: DeckInputs) {
        self.inputs = inputs;
        save_json(self.store.as_ref(), keys::PRESENTATION_FORM, &inputs);
    }

    pub fn validate_inputs(&self) -> Validation {
        self.inputs.validate()
    }

    pub fn deck(&self) -> Option<&PresentationDeck> {
        self.deck.as_ref()
    }

    pub fn phase(&self) -> DeckPhase {
        self.phase
    }

    pub fn slide_index(&self) -> usize {
        self.slide_index
    }

    pub fn current_slide(&self) -> Option<&Slide> {
        self.deck.as_ref()?.slides.get(self.slide_index)
    }

    pub fn edit_instruction(&self) -> &str {
        &self.edit_instruction
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[instrument(skip(self, api, context), fields(business = %context.business_name))]
    pub async fn generate(
        &mut self,
        api: &ApiClient,
        context: &BusinessContext,
    ) -> WorkflowResult<&PresentationDeck> {
        self.validate_inputs().into_result()?;
        self.error = None;
        let previous = self.phase;
        self.phase = DeckPhase::Generating;

        let request = GeneratePresentationRequest {
            business_context: context.clone(),
            num_slides: self.inputs.num_slides,
            duration_minutes: self.inputs.duration_minutes,
        };
        info!(
            "Generating {} slides for {} minutes",
            request.num_slides, request.duration_minutes
        );

        match api.generate_presentation(&request).await {
            Ok(deck) => {
                self.edit_instruction.clear();
                self.phase = DeckPhase::Viewing;
                Ok(self.replace_deck(deck, 0))
            }
            Err(e) => {
                warn!("Deck generation failed: {}", e);
                self.phase = if previous == DeckPhase::Editing { DeckPhase::Viewing } else { previous };
                self.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    pub fn begin_edit(&mut self) -> WorkflowResult<()> {
        if self.deck.is_none() {
            return Err(WorkflowError::NoDeck);
        }
        self.phase = DeckPhase::Editing;
        Ok(())
    }

    pub fn cancel_edit(&mut self) {
        self.edit_instruction.clear();
        if self.phase == DeckPhase::Editing {
            self.phase = DeckPhase::Viewing;
        }
    }

    pub fn set_edit_instruction(&mut self, instruction: impl Into<String>) {
        self.edit_instruction = instruction.into();
    }

    /// Sends the whole current deck with the edit instruction and replaces the
    /// deck with the answer. The slide index is kept, clamped to the new deck.
    #[instrument(skip(self, api, context))]
    pub async fn apply_edit(
        &mut self,
        api: &ApiClient,
        context: &BusinessContext,
    ) -> WorkflowResult<&PresentationDeck> {
        let current = self.deck.as_ref().ok_or(WorkflowError::NoDeck)?;
        let instruction = self.edit_instruction.trim();
        if instruction.is_empty() {
            let mut validation = Validation::default();
            validation.reject("edit_request", "Describe the change you want");
            return Err(WorkflowError::Invalid(validation));
        }
        let request = EditPresentationRequest {
            current_presentation: current.slides.clone(),
            edit_request: instruction.to_string(),
            business_context: context.clone(),
        };
        self.error = None;
        self.phase = DeckPhase::Editing;

        match api.edit_presentation(&request).await {
            Ok(deck) => {
                self.edit_instruction.clear();
                self.phase = DeckPhase::Viewing;
                let index = self.slide_index;
                Ok(self.replace_deck(deck, index))
            }
            Err(e) => {
                warn!("Deck edit failed: {}", e);
                self.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Asks the backend to render the current deck. The deck itself is not
    /// touched, so exporting twice yields two identical files.
    pub async fn export(&mut self, api: &ApiClient, business_name: &str) -> WorkflowResult<ExportedFile> {
        let deck = self.deck.as_ref().ok_or(WorkflowError::NoDeck)?;
        let request = ExportPresentationRequest {
            presentation: deck.clone(),
            business_name: business_name.to_string(),
        };
        self.error = None;

        api.export_presentation(&request).await.map_err(|e| {
            warn!("Deck export failed: {}", e);
            self.error = Some(e.to_string());
            e.into()
        })
    }

    pub fn next(&mut self) -> usize {
        self.go_to(self.slide_index.saturating_add(1))
    }

    pub fn prev(&mut self) -> usize {
        self.go_to(self.slide_index.saturating_sub(1))
    }

    /// Moves to `index`, clamped to the deck.
    pub fn go_to(&mut self, index: usize) -> usize {
        let Some(deck) = &self.deck else {
            return 0;
        };
        let clamped = index.min(deck.slide_count().saturating_sub(1));
        if clamped != self.slide_index {
            self.slide_index = clamped;
            save_json(self.store.as_ref(), keys::SLIDE_INDEX, &clamped);
        }
        self.slide_index
    }

    /// Discards the deck and starts over from the inputs.
    pub fn reset(&mut self) {
        self.deck = None;
        self.slide_index = 0;
        self.phase = DeckPhase::Idle;
        self.edit_instruction.clear();
        self.error = None;
        self.store.remove(keys::DECK);
        self.store.remove(keys::SLIDE_INDEX);
    }

    fn replace_deck(&mut self, deck: PresentationDeck, index: usize) -> &PresentationDeck {
        self.slide_index = index.min(deck.slide_count().saturating_sub(1));
        save_json(self.store.as_ref(), keys::DECK, &deck);
        save_json(self.store.as_ref(), keys::SLIDE_INDEX, &self.slide_index);
        self.deck.insert(deck)
    }
}
