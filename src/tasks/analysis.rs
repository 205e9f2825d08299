use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use tracing::{info, instrument};

use super::{keys, record_task_time, ANALYSIS_NORMALIZE, ANALYSIS_PROMPT};
use crate::models::{AnalysisResult, AnalyzeRequest};
use crate::prompts::build_analysis_prompt;
use crate::tools::normalize::{extract_json, normalize_analysis};

pub const AI_DISCLAIMER: &str = "IMPORTANT: This analysis is AI-generated from the model's training data. \
Business information may be outdated or inaccurate. Verify all competitor details independently \
(web searches, maps, direct contact) before making business decisions.";

pub struct AnalysisPromptTask;

#[async_trait]
impl Task for AnalysisPromptTask {
    fn id(&self) -> &str {
        ANALYSIS_PROMPT
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();

        let input: AnalyzeRequest = context
            .get(keys::ANALYSIS_INPUT)
            .await
            .ok_or_else(|| GraphError::ContextError("Analysis input not found".to_string()))?;

        info!(
            "Building analysis prompt for '{}' in {}, {}",
            input.business_name, input.location_city, input.country
        );
        let prompt = build_analysis_prompt(&input);
        context.set(keys::PROMPT, prompt).await;
        context.set(keys::MODEL_SELECTION, input.model_selection.clone()).await;

        record_task_time(&context, ANALYSIS_PROMPT, start_time).await;

        Ok(TaskResult::new(
            Some("Analysis prompt built".to_string()),
            NextAction::ContinueAndExecute,
        ))
    }
}

pub struct AnalysisNormalizeTask;

#[async_trait]
impl Task for AnalysisNormalizeTask {
    fn id(&self) -> &str {
        ANALYSIS_NORMALIZE
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();

        let raw: String = context
            .get(keys::RAW_RESPONSE)
            .await
            .ok_or_else(|| GraphError::ContextError("Model response not found".to_string()))?;
        let prompt: Option<String> = context.get(keys::PROMPT).await;

        let value = extract_json(&raw).map_err(GraphError::Other)?;
        let analysis = AnalysisResult {
            prompt,
            disclaimer: Some(AI_DISCLAIMER.to_string()),
            ..normalize_analysis(&value)
        };

        info!(
            "Normalized analysis with {} competitors, {} add-ons",
            analysis.competing_players.len(),
            analysis.undiscovered_addons.len()
        );
        context.set(keys::ANALYSIS, analysis).await;

        record_task_time(&context, ANALYSIS_NORMALIZE, start_time).await;

        Ok(TaskResult::new(
            Some("Analysis ready".to_string()),
            NextAction::End,
        ))
    }
}
