use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use super::{keys, record_task_time, DECK_NORMALIZE, DECK_PROMPT};
use crate::models::{BusinessContext, Slide};
use crate::prompts::{build_deck_prompt, build_edit_prompt};
use crate::tools::normalize::{extract_json, normalize_deck};

/// What the deck pipeline has been asked to do.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeckJob {
    Generate {
        context: BusinessContext,
        num_slides: u32,
        duration_minutes: u32,
    },
    Edit {
        current: Vec<Slide>,
        edit_request: String,
        context: BusinessContext,
    },
}

impl DeckJob {
    fn context(&self) -> &BusinessContext {
        match self {
            DeckJob::Generate { context, .. } | DeckJob::Edit { context, .. } => context,
        }
    }

    fn expected_slides(&self) -> Option<usize> {
        match self {
            DeckJob::Generate { num_slides, .. } => Some(*num_slides as usize),
            DeckJob::Edit { .. } => None,
        }
    }

    fn default_minutes(&self) -> f64 {
        match self {
            DeckJob::Generate { duration_minutes, .. } => f64::from(*duration_minutes),
            DeckJob::Edit { current, .. } => {
                let seconds: u32 = current.iter().filter_map(|s| s.duration_seconds).sum();
                if seconds > 0 {
                    f64::from(seconds) / 60.0
                } else {
                    current.len() as f64 * 0.5
                }
            }
        }
    }
}

pub struct DeckPromptTask {
    model_selection: String,
}

impl DeckPromptTask {
    pub fn new(model_selection: String) -> Self {
        Self { model_selection }
    }
}

#[async_trait]
impl Task for DeckPromptTask {
    fn id(&self) -> &str {
        DECK_PROMPT
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();

        let job: DeckJob = context
            .get(keys::DECK_JOB)
            .await
            .ok_or_else(|| GraphError::ContextError("Deck job not found".to_string()))?;

        let prompt = match &job {
            DeckJob::Generate { context: business, num_slides, duration_minutes } => {
                info!(
                    "Building deck prompt for '{}': {} slides, {} minutes",
                    business.business_name, num_slides, duration_minutes
                );
                build_deck_prompt(business, *num_slides, *duration_minutes)
            }
            DeckJob::Edit { current, edit_request, context: business } => {
                info!(
                    "Building edit prompt for '{}' over {} slides",
                    business.business_name,
                    current.len()
                );
                build_edit_prompt(current, edit_request, business)
                    .map_err(|e| GraphError::Other(e.into()))?
            }
        };

        context.set(keys::PROMPT, prompt).await;
        context.set(keys::MODEL_SELECTION, self.model_selection.clone()).await;

        record_task_time(&context, DECK_PROMPT, start_time).await;

        Ok(TaskResult::new(
            Some("Deck prompt built".to_string()),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct DeckNormalizeTask;

#[async_trait]
impl Task for DeckNormalizeTask {
    fn id(&self) -> &str {
        DECK_NORMALIZE
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();

        let job: DeckJob = context
            .get(keys::DECK_JOB)
            .await
            .ok_or_else(|| GraphError::ContextError("Deck job not found".to_string()))?;
        let raw: String = context
            .get(keys::RAW_RESPONSE)
            .await
            .ok_or_else(|| GraphError::ContextError("Model response not found".to_string()))?;

        let value = extract_json(&raw).map_err(GraphError::Other)?;
        let deck = normalize_deck(
            &value,
            job.expected_slides(),
            job.default_minutes(),
            &job.context().business_name,
        )
        .map_err(GraphError::Other)?;

        info!(
            "Deck '{}' has {} slides over {} minutes",
            deck.presentation_title,
            deck.slide_count(),
            deck.total_duration_minutes
        );
        context.set(keys::DECK, deck).await;

        record_task_time(&context, DECK_NORMALIZE, start_time).await;

        Ok(TaskResult::new(
            Some("Deck ready".to_string()),
            NextAction::End,
        ))
    }
}
