use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::api::ApiClient;
use super::store::{keys, load_json, save_json, KeyValueStore};
use super::Validation;
use crate::countries::{canonical_country, COUNTRIES};
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{AnalysisResult, AnalyzeRequest, BusinessContext, DEFAULT_BUSINESS_NAME};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSelection {
    #[default]
    #[serde(rename = "chatgpt-latest")]
    ChatgptLatest,
    #[serde(rename = "google-gemini-flash")]
    GoogleGeminiFlash,
}

impl ModelSelection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSelection::ChatgptLatest => "chatgpt-latest",
            ModelSelection::GoogleGeminiFlash => "google-gemini-flash",
        }
    }
}

impl FromStr for ModelSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "chatgpt-latest" => Ok(ModelSelection::ChatgptLatest),
            "google-gemini-flash" => Ok(ModelSelection::GoogleGeminiFlash),
            other => Err(format!(
                "Unknown model '{other}', expected chatgpt-latest or google-gemini-flash"
            )),
        }
    }
}

impl fmt::Display for ModelSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Business details collected by the intake form. Empty strings mean "not
/// filled in".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakeForm {
    pub business_name: String,
    pub location_city: String,
    pub country: String,
    pub target_audience: String,
    pub budget: String,
    pub business_type: String,
    pub raw_idea: String,
    pub problem: String,
    pub model_selection: ModelSelection,
    pub time_commitment: String,
    pub output_tone: String,
    pub language: String,
    pub stage_of_idea: String,
    pub time_horizon: String,
    /// Text extracted from an attachment. Sent with one submission, never
    /// persisted.
    #[serde(skip)]
    pub file_content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FormField {
    BusinessName,
    LocationCity,
    Country,
    TargetAudience,
    Budget,
    BusinessType,
    RawIdea,
    Problem,
    ModelSelection,
    TimeCommitment,
    OutputTone,
    Language,
    StageOfIdea,
    TimeHorizon,
}

impl FormField {
    pub const ALL: [FormField; 14] = [
        FormField::BusinessName,
        FormField::LocationCity,
        FormField::Country,
        FormField::TargetAudience,
        FormField::Budget,
        FormField::BusinessType,
        FormField::RawIdea,
        FormField::Problem,
        FormField::ModelSelection,
        FormField::TimeCommitment,
        FormField::OutputTone,
        FormField::Language,
        FormField::StageOfIdea,
        FormField::TimeHorizon,
    ];

    /// Wire (snake_case) name.
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::BusinessName => "business_name",
            FormField::LocationCity => "location_city",
            FormField::Country => "country",
            FormField::TargetAudience => "target_audience",
            FormField::Budget => "budget",
            FormField::BusinessType => "business_type",
            FormField::RawIdea => "raw_idea",
            FormField::Problem => "problem",
            FormField::ModelSelection => "model_selection",
            FormField::TimeCommitment => "time_commitment",
            FormField::OutputTone => "output_tone",
            FormField::Language => "language",
            FormField::StageOfIdea => "stage_of_idea",
            FormField::TimeHorizon => "time_horizon",
        }
    }
}

impl FromStr for FormField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_");
        FormField::ALL
            .into_iter()
            .find(|field| field.as_str() == wanted)
            .ok_or_else(|| format!("Unknown form field '{s}'"))
    }
}

impl fmt::Display for FormField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl IntakeForm {
    pub fn value(&self, field: FormField) -> String {
        match field {
            FormField::ModelSelection => self.model_selection.as_str().to_string(),
            other => self.text(other).map(String::clone).unwrap_or_default(),
        }
    }

    fn text(&self, field: FormField) -> Option<&String> {
        Some(match field {
            FormField::BusinessName => &self.business_name,
            FormField::LocationCity => &self.location_city,
            FormField::Country => &self.country,
            FormField::TargetAudience => &self.target_audience,
            FormField::Budget => &self.budget,
            FormField::BusinessType => &self.business_type,
            FormField::RawIdea => &self.raw_idea,
            FormField::Problem => &self.problem,
            FormField::TimeCommitment => &self.time_commitment,
            FormField::OutputTone => &self.output_tone,
            FormField::Language => &self.language,
            FormField::StageOfIdea => &self.stage_of_idea,
            FormField::TimeHorizon => &self.time_horizon,
            FormField::ModelSelection => return None,
        })
    }

    fn text_mut(&mut self, field: FormField) -> Option<&mut String> {
        Some(match field {
            FormField::BusinessName => &mut self.business_name,
            FormField::LocationCity => &mut self.location_city,
            FormField::Country => &mut self.country,
            FormField::TargetAudience => &mut self.target_audience,
            FormField::Budget => &mut self.budget,
            FormField::BusinessType => &mut self.business_type,
            FormField::RawIdea => &mut self.raw_idea,
            FormField::Problem => &mut self.problem,
            FormField::TimeCommitment => &mut self.time_commitment,
            FormField::OutputTone => &mut self.output_tone,
            FormField::Language => &mut self.language,
            FormField::StageOfIdea => &mut self.stage_of_idea,
            FormField::TimeHorizon => &mut self.time_horizon,
            FormField::ModelSelection => return None,
        })
    }

    /// Request body for `/api/analyze`: blank name replaced by the default,
    /// blank optionals sent as `null`.
    pub fn to_request(&self) -> AnalyzeRequest {
        let optional = |value: &str| {
            let value = value.trim();
            (!value.is_empty()).then(|| value.to_string())
        };
        let country = canonical_country(&self.country)
            .map(str::to_string)
            .unwrap_or_else(|| self.country.trim().to_string());

        AnalyzeRequest {
            business_name: optional(&self.business_name)
                .unwrap_or_else(|| DEFAULT_BUSINESS_NAME.to_string()),
            location_city: self.location_city.trim().to_string(),
            country,
            target_audience: optional(&self.target_audience),
            budget: optional(&self.budget),
            business_type: optional(&self.business_type),
            raw_idea: self.raw_idea.trim().to_string(),
            problem: optional(&self.problem),
            file_content: self.file_content.as_deref().and_then(optional),
            photos_description: None,
            model_selection: self.model_selection.as_str().to_string(),
            time_commitment: optional(&self.time_commitment),
            output_tone: optional(&self.output_tone),
            language: optional(&self.language),
            stage_of_idea: optional(&self.stage_of_idea),
            time_horizon: optional(&self.time_horizon),
        }
    }
}

/// Checks everything that must hold before the form may be submitted.
pub fn validate(form: &IntakeForm, terms_accepted: bool) -> Validation {
    let mut validation = Validation::default();

    let country = form.country.trim();
    if country.is_empty() {
        validation.reject("country", "Country is required");
    } else if canonical_country(country).is_none() {
        validation.reject(
            "country",
            format!("'{country}' is not a recognised country; pick one of the {} listed countries", COUNTRIES.len()),
        );
    }
    if form.location_city.trim().is_empty() {
        validation.reject("location_city", "City is required");
    }
    if form.raw_idea.trim().is_empty() {
        validation.reject("raw_idea", "Describe your business idea");
    }
    if form.time_commitment.trim().is_empty() {
        validation.reject("time_commitment", "Time commitment is required");
    }
    if !terms_accepted {
        validation.reject("terms_accepted", "You must accept the terms to continue");
    }

    validation
}

/// Builds the context handed to the results stage. An AI-suggested name wins
/// over the typed one.
pub fn business_context(request: &AnalyzeRequest, result: &AnalysisResult) -> BusinessContext {
    let business_name = result
        .suggested_business_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| request.business_name.clone());

    BusinessContext {
        business_name,
        location_city: request.location_city.clone(),
        country: request.country.clone(),
        raw_idea: request.raw_idea.clone(),
        problem: request.problem.clone(),
        target_audience: request.target_audience.clone(),
        budget: request.budget.clone(),
        business_type: request.business_type.clone(),
        time_commitment: request.time_commitment.clone(),
        output_tone: request.output_tone.clone(),
        language: request.language.clone(),
        stage_of_idea: request.stage_of_idea.clone(),
        time_horizon: request.time_horizon.clone(),
        ..Default::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormCapabilities {
    pub file_attachment: bool,
}

impl Default for FormCapabilities {
    fn default() -> Self {
        Self {
            file_attachment: true,
        }
    }
}

/// A successful analysis, ready to be handed to the router.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub result: AnalysisResult,
    pub context: BusinessContext,
}

pub struct FormStage {
    store: Arc<dyn KeyValueStore>,
    form: IntakeForm,
    terms_accepted: bool,
    capabilities: FormCapabilities,
    error: Option<String>,
}

impl FormStage {
    /// Restores the last snapshot from `store`, or starts from defaults.
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let form = load_json(store.as_ref(), keys::FORM).unwrap_or_default();
        let terms_accepted = load_json(store.as_ref(), keys::TERMS_ACCEPTED).unwrap_or(false);
        Self {
            store,
            form,
            terms_accepted,
            capabilities: FormCapabilities::default(),
            error: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: FormCapabilities) -> Self {
        self.capabilities = capabilities;
        if !capabilities.file_attachment {
            self.form.file_content = None;
        }
        self
    }

    pub fn form(&self) -> &IntakeForm {
        &self.form
    }

    pub fn terms_accepted(&self) -> bool {
        self.terms_accepted
    }

    /// Banner text from the last failed submission.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Updates one field and persists the snapshot, whether or not the form
    /// is valid yet.
    pub fn set_field(&mut self, field: FormField, value: &str) -> WorkflowResult<()> {
        match field {
            FormField::ModelSelection => {
                self.form.model_selection = value.parse().map_err(|message: String| {
                    let mut validation = Validation::default();
                    validation.reject("model_selection", message);
                    WorkflowError::Invalid(validation)
                })?;
            }
            other => {
                if let Some(slot) = self.form.text_mut(other) {
                    *slot = value.to_string();
                }
            }
        }
        self.persist();
        Ok(())
    }

    pub fn set_terms_accepted(&mut self, accepted: bool) {
        self.terms_accepted = accepted;
        save_json(self.store.as_ref(), keys::TERMS_ACCEPTED, &accepted);
    }

    /// Attaches already-extracted text for the next submission only.
    pub fn attach_file_text(&mut self, text: impl Into<String>) -> WorkflowResult<()> {
        if !self.capabilities.file_attachment {
            let mut validation = Validation::default();
            validation.reject("file_content", "File attachments are not supported here");
            return Err(WorkflowError::Invalid(validation));
        }
        self.form.file_content = Some(text.into());
        Ok(())
    }

    /// Forgets everything the user typed.
    pub fn clear(&mut self) {
        self.form = IntakeForm::default();
        self.terms_accepted = false;
        self.error = None;
        self.store.remove(keys::FORM);
        self.store.remove(keys::TERMS_ACCEPTED);
    }

    pub fn validate(&self) -> Validation {
        validate(&self.form, self.terms_accepted)
    }

    /// Validates, sends the analysis request and returns the result together
    /// with the business context. Failures leave the form untouched and set
    /// the banner.
    #[instrument(skip(self, api))]
    pub async fn submit(&mut self, api: &ApiClient) -> WorkflowResult<Submission> {
        self.error = None;
        self.validate().into_result()?;

        let request = self.form.to_request();
        info!(
            "Submitting '{}' in {}, {} to {}",
            request.business_name, request.location_city, request.country, request.model_selection
        );

        match api.analyze(&request).await {
            Ok(result) => {
                self.form.file_content = None;
                let context = business_context(&request, &result);
                Ok(Submission { result, context })
            }
            Err(e) => {
                warn!("Analysis failed: {}", e);
                self.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    fn persist(&self) {
        save_json(self.store.as_ref(), keys::FORM, &self.form);
    }
}
