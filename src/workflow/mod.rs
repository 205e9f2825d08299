//! The pitch workflow as seen from the user's side: form, results, and the
//! deck/video generators, wired together by a linear router and backed by a
//! durable key-value store.

pub mod api;
pub mod form;
pub mod pitch;
pub mod presentation;
pub mod results;
pub mod router;
pub mod store;
pub mod video;

use std::collections::BTreeMap;
use std::fmt;

use crate::error::WorkflowError;

pub use api::{ApiClient, ExportedFile};
pub use form::{FormCapabilities, FormField, FormStage, IntakeForm, ModelSelection, Submission};
pub use pitch::{GeneratorChoice, PitchStage};
pub use presentation::{DeckFlow, DeckInputs, DeckPhase};
pub use results::{Card, ResultsStage, ResultsView};
pub use router::{NavPayload, Stage, WorkflowRouter};
pub use store::{FileStore, KeyValueStore, MemoryStore};
pub use video::{VideoFlow, VideoInputs};

/// Outcome of client-side validation, keyed by wire field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    field_errors: BTreeMap<&'static str, String>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.field_errors.is_empty()
    }

    pub fn field_errors(&self) -> &BTreeMap<&'static str, String> {
        &self.field_errors
    }

    pub fn error(&self, field: &str) -> Option<&str> {
        self.field_errors.get(field).map(String::as_str)
    }

    pub(crate) fn reject(&mut self, field: &'static str, message: impl Into<String>) {
        self.field_errors.entry(field).or_insert_with(|| message.into());
    }

    pub fn into_result(self) -> Result<(), WorkflowError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(WorkflowError::Invalid(self))
        }
    }
}

impl fmt::Display for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.field_errors.values().map(String::as_str).collect();
        write!(f, "{}", messages.join("; "))
    }
}
