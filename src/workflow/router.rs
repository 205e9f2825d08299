use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::api::ApiClient;
use super::form::{business_context, FormStage, IntakeForm, Submission};
use super::store::{keys, load_json, save_json, KeyValueStore};
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{AnalysisResult, BusinessContext, CompetingPlayer};
use crate::tasks::AI_DISCLAIMER;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    Landing,
    Form,
    Results,
    Pitch,
}

impl Stage {
    fn next(self) -> Option<Stage> {
        match self {
            Stage::Landing => Some(Stage::Form),
            Stage::Form => Some(Stage::Results),
            Stage::Results => Some(Stage::Pitch),
            Stage::Pitch => None,
        }
    }

    fn previous(self) -> Stage {
        match self {
            Stage::Landing | Stage::Form => Stage::Landing,
            Stage::Results => Stage::Form,
            Stage::Pitch => Stage::Results,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Landing => "landing",
            Stage::Form => "form",
            Stage::Results => "results",
            Stage::Pitch => "pitch",
        };
        f.write_str(name)
    }
}

/// What a forward move carries into the next stage.
#[derive(Debug, Clone)]
pub enum NavPayload {
    Start,
    Analysis(Submission),
    Pitch(BusinessContext),
}

impl NavPayload {
    fn target(&self) -> Stage {
        match self {
            NavPayload::Start => Stage::Form,
            NavPayload::Analysis(_) => Stage::Results,
            NavPayload::Pitch(_) => Stage::Pitch,
        }
    }
}

/// Linear navigation Landing -> Form -> Results -> Pitch.
///
/// Payloads are kept in memory for the current run and mirrored to the store,
/// so a later process can rebuild them.
pub struct WorkflowRouter {
    store: Arc<dyn KeyValueStore>,
    stage: Stage,
    analysis: Option<Submission>,
    pitch: Option<BusinessContext>,
}

impl WorkflowRouter {
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let stage = load_json(store.as_ref(), keys::STAGE).unwrap_or_default();
        Self {
            store,
            stage,
            analysis: None,
            pitch: None,
        }
    }

    pub fn current(&self) -> Stage {
        self.stage
    }

    /// Moves one stage forward. Skipping a stage or handing over the wrong
    /// payload is refused and leaves the router where it was.
    pub fn advance(&mut self, payload: NavPayload) -> WorkflowResult<Stage> {
        let target = payload.target();
        if self.stage.next() != Some(target) {
            return Err(WorkflowError::Navigation(format!(
                "cannot go from {} to {}",
                self.stage, target
            )));
        }

        match payload {
            NavPayload::Start => {}
            NavPayload::Analysis(submission) => {
                save_json(self.store.as_ref(), keys::ANALYSIS, &submission.result);
                save_json(self.store.as_ref(), keys::CONTEXT, &submission.context);
                self.analysis = Some(submission);
                self.pitch = None;
            }
            NavPayload::Pitch(context) => {
                save_json(self.store.as_ref(), keys::CONTEXT, &context);
                self.pitch = Some(context);
            }
        }

        info!("Stage {} -> {}", self.stage, target);
        self.set_stage(target);
        Ok(target)
    }

    /// Submits `form` and moves to the results stage from wherever the router
    /// stands. The stage only changes once the analysis is back: a rejected
    /// form or a failed request leaves it as it was.
    pub async fn submit(&mut self, form: &mut FormStage, api: &ApiClient) -> WorkflowResult<Submission> {
        let submission = form.submit(api).await?;

        while self.stage > Stage::Form {
            self.back();
        }
        if self.stage == Stage::Landing {
            self.advance(NavPayload::Start)?;
        }
        self.advance(NavPayload::Analysis(submission.clone()))?;
        Ok(submission)
    }

    /// Steps back one stage. Nothing that was generated or typed is removed.
    pub fn back(&mut self) -> Stage {
        let target = self.stage.previous();
        if target != self.stage {
            debug!("Stage {} -> {}", self.stage, target);
            self.set_stage(target);
        }
        self.stage
    }

    /// Analysis for the results stage: this run's payload, else the stored
    /// analysis, else an illustrative placeholder.
    pub fn results_payload(&self) -> Submission {
        if let Some(submission) = &self.analysis {
            return submission.clone();
        }

        let form: IntakeForm = load_json(self.store.as_ref(), keys::FORM).unwrap_or_default();
        let result = load_json(self.store.as_ref(), keys::ANALYSIS).unwrap_or_else(placeholder_analysis);
        let context = load_json(self.store.as_ref(), keys::CONTEXT)
            .unwrap_or_else(|| business_context(&form.to_request(), &result));

        Submission { result, context }
    }

    /// Context for the pitch stage: this run's payload, else the stored
    /// context, else one rebuilt from the stored form.
    pub fn pitch_context(&self) -> BusinessContext {
        if let Some(context) = &self.pitch {
            return context.clone();
        }
        if let Some(context) = load_json(self.store.as_ref(), keys::CONTEXT) {
            return context;
        }

        let form: IntakeForm = load_json(self.store.as_ref(), keys::FORM).unwrap_or_default();
        let placeholder = placeholder_analysis();
        business_context(&form.to_request(), &placeholder).enriched_with(&placeholder)
    }

    fn set_stage(&mut self, stage: Stage) {
        self.stage = stage;
        save_json(self.store.as_ref(), keys::STAGE, &stage);
    }
}

/// Sample analysis shown when the results stage is reached without one.
pub fn placeholder_analysis() -> AnalysisResult {
    AnalysisResult {
        prompt: None,
        competing_players: vec![
            CompetingPlayer {
                name: "Established local competitor".to_string(),
                description: Some("A well-known business serving the same customers".to_string()),
                strengths: vec!["Brand recognition".to_string(), "Loyal customer base".to_string()],
                ..Default::default()
            },
            CompetingPlayer {
                name: "Online alternative".to_string(),
                description: Some("A digital-first option with delivery".to_string()),
                strengths: vec!["Convenience".to_string()],
                ..Default::default()
            },
        ],
        market_cap_or_target_revenue: "Example only: run an analysis for a real estimate".to_string(),
        major_vicinity_locations: vec!["City centre".to_string(), "Business district".to_string()],
        target_audience: vec!["Young professionals".to_string(), "Local families".to_string()],
        undiscovered_addons: vec!["Subscription offer".to_string(), "Workshops".to_string()],
        disclaimer: Some(AI_DISCLAIMER.to_string()),
        suggested_business_name: None,
    }
}
