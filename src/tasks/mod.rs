mod analysis;
mod deck;
mod model_query;

pub use analysis::{AnalysisNormalizeTask, AnalysisPromptTask, AI_DISCLAIMER};
pub use deck::{DeckJob, DeckNormalizeTask, DeckPromptTask};
pub use model_query::ModelQueryTask;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use graph_flow::{Context, ExecutionStatus, FlowRunner, Graph, GraphBuilder, Session, SessionStorage};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::models::TaskTimes;
use crate::tools::llm::{ModelRouter, ANALYST_PREAMBLE, PITCH_PREAMBLE};

pub const ANALYSIS_PROMPT: &str = "analysis_prompt";
pub const ANALYSIS_QUERY: &str = "analysis_query";
pub const ANALYSIS_NORMALIZE: &str = "analysis_normalize";
pub const DECK_PROMPT: &str = "deck_prompt";
pub const DECK_QUERY: &str = "deck_query";
pub const DECK_NORMALIZE: &str = "deck_normalize";

pub mod keys {
    pub const ANALYSIS_INPUT: &str = "analysis_input";
    pub const DECK_JOB: &str = "deck_job";
    pub const PROMPT: &str = "prompt";
    pub const MODEL_SELECTION: &str = "model_selection";
    pub const RAW_RESPONSE: &str = "raw_response";
    pub const ANALYSIS: &str = "analysis";
    pub const DECK: &str = "deck";
    pub const TASK_TIMES: &str = "task_times";
}

pub fn analysis_graph(models: Arc<ModelRouter>) -> Graph {
    GraphBuilder::new("analysis_workflow")
        .add_task(Arc::new(AnalysisPromptTask))
        .add_task(Arc::new(ModelQueryTask::new(ANALYSIS_QUERY, ANALYST_PREAMBLE, models)))
        .add_task(Arc::new(AnalysisNormalizeTask))
        .add_edge(ANALYSIS_PROMPT, ANALYSIS_QUERY)
        .add_edge(ANALYSIS_QUERY, ANALYSIS_NORMALIZE)
        .build()
}

pub fn deck_graph(models: Arc<ModelRouter>, deck_model: String) -> Graph {
    GraphBuilder::new("deck_workflow")
        .add_task(Arc::new(DeckPromptTask::new(deck_model)))
        .add_task(Arc::new(ModelQueryTask::new(DECK_QUERY, PITCH_PREAMBLE, models)))
        .add_task(Arc::new(DeckNormalizeTask))
        .add_edge(DECK_PROMPT, DECK_QUERY)
        .add_edge(DECK_QUERY, DECK_NORMALIZE)
        .build()
}

pub(crate) async fn record_task_time(context: &Context, task_id: &str, start: Instant) {
    let elapsed = start.elapsed().as_millis() as u64;
    let mut task_times: TaskTimes = context.get(keys::TASK_TIMES).await.unwrap_or_default();
    task_times.insert(task_id.to_string(), elapsed);
    context.set(keys::TASK_TIMES, task_times).await;
}

/// A graph plus the task every session starts from.
pub struct Pipeline {
    name: &'static str,
    start_task: &'static str,
    runner: FlowRunner,
    storage: Arc<dyn SessionStorage>,
}

impl Pipeline {
    pub fn new(
        name: &'static str,
        graph: Graph,
        start_task: &'static str,
        storage: Arc<dyn SessionStorage>,
    ) -> Self {
        Self {
            name,
            start_task,
            runner: FlowRunner::new(Arc::new(graph), storage.clone()),
            storage,
        }
    }

    /// Seeds a fresh session with `inputs`, drives it to completion and
    /// returns the finished session. The session is removed from storage
    /// afterwards.
    pub async fn execute(&self, inputs: Vec<(&'static str, serde_json::Value)>) -> Result<Session> {
        let start_time = Instant::now();
        let session_id = Uuid::new_v4().to_string();
        info!("Starting {} for session {}", self.name, session_id);

        let session = Session::new_from_task(session_id.clone(), self.start_task);
        for (key, value) in inputs {
            session.context.set(key, value).await;
        }
        self.storage
            .save(session)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to save session: {}", e))?;

        let outcome = self.drive(&session_id).await;

        let session = self
            .storage
            .get(&session_id)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to load session: {}", e))?;
        if let Err(e) = self.storage.delete(&session_id).await {
            debug!("Could not delete session {}: {}", session_id, e);
        }
        outcome?;

        let session = session.ok_or_else(|| anyhow::anyhow!("Session {} disappeared", session_id))?;
        let task_times: TaskTimes = session.context.get(keys::TASK_TIMES).await.unwrap_or_default();
        info!(
            "{} completed in {:?} ({:?})",
            self.name,
            start_time.elapsed(),
            task_times
        );
        Ok(session)
    }

    async fn drive(&self, session_id: &str) -> Result<()> {
        loop {
            let result = self
                .runner
                .run(session_id)
                .await
                .map_err(|e| anyhow::anyhow!("{}", e))?;

            match &result.status {
                ExecutionStatus::Completed => return Ok(()),
                ExecutionStatus::Paused { next_task_id, .. } => {
                    debug!("{} paused, next task: {}", self.name, next_task_id);
                    continue;
                }
                ExecutionStatus::Error(e) => {
                    error!("{} error: {}", self.name, e);
                    anyhow::bail!("{}", e);
                }
                _ => anyhow::bail!("{} stopped before completing", self.name),
            }
        }
    }
}
