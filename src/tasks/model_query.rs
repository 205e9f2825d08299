use std::sync::Arc;

use async_trait::async_trait;
use graph_flow::{Context, GraphError, NextAction, Task, TaskResult};
use tracing::{info, instrument};

use super::{keys, record_task_time};
use crate::tools::llm::ModelRouter;

/// Sends the prompt in the session to the model named by `model_selection`
/// and stores the raw completion text.
pub struct ModelQueryTask {
    id: &'static str,
    preamble: &'static str,
    models: Arc<ModelRouter>,
}

impl ModelQueryTask {
    pub fn new(id: &'static str, preamble: &'static str, models: Arc<ModelRouter>) -> Self {
        Self { id, preamble, models }
    }
}

#[async_trait]
impl Task for ModelQueryTask {
    fn id(&self) -> &str {
        self.id
    }

    #[instrument(skip(self, context))]
    async fn run(&self, context: Context) -> Result<TaskResult, GraphError> {
        let start_time = std::time::Instant::now();

        let prompt: String = context
            .get(keys::PROMPT)
            .await
            .ok_or_else(|| GraphError::ContextError("Prompt not found".to_string()))?;
        let selection: String = context
            .get(keys::MODEL_SELECTION)
            .await
            .ok_or_else(|| GraphError::ContextError("Model selection not found".to_string()))?;

        info!("Querying {} with a {} character prompt", selection, prompt.len());
        let backend = self.models.resolve(&selection).map_err(GraphError::Other)?;
        let response = backend
            .complete(self.preamble, &prompt)
            .await
            .map_err(|e| GraphError::Other(anyhow::anyhow!("Model query failed: {}", e)))?;

        info!("Received {} characters from {}", response.len(), selection);
        context.set(keys::RAW_RESPONSE, response).await;

        record_task_time(&context, self.id, start_time).await;

        Ok(TaskResult::new(
            Some(format!("{} answered", selection)),
            NextAction::ContinueAndExecute,
        ))
    }
}
