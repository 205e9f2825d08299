use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rig::completion::Prompt;
use rig::prelude::*;
use rig::providers::openai;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::Settings;
use crate::models::ModelInfo;

pub const ANALYST_PREAMBLE: &str = "You are a business research analyst with access to current business \
information. Your primary goal is ACCURACY: only provide information about businesses you can verify exist. \
If you are uncertain about a business, do not include it. Respond only with valid JSON, no markdown or code blocks.";

pub const PITCH_PREAMBLE: &str = "You are an experienced startup pitch coach and presentation designer. \
You write concise, persuasive slide content grounded in the research you are given. \
Respond only with valid JSON, no markdown or code blocks.";

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Google,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Google => "google",
        }
    }
}

/// User-facing model ids mapped to (provider, provider model id).
pub const MODEL_REGISTRY: &[(&str, Provider, &str)] = &[
    ("chatgpt-latest", Provider::OpenAi, "gpt-5.2-chat-latest"),
    ("google-gemini-flash", Provider::Google, "gemini-2.5-flash"),
];

pub fn list_models() -> Vec<ModelInfo> {
    MODEL_REGISTRY
        .iter()
        .map(|(id, provider, model_id)| ModelInfo {
            id: id.to_string(),
            provider: provider.as_str().to_string(),
            model_id: model_id.to_string(),
        })
        .collect()
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Unknown model: {selection}. Available: {available}")]
    UnknownModel { selection: String, available: String },

    #[error("OpenAI API key required for OpenAI models")]
    MissingOpenAiKey,

    #[error("Google API key required for Google (Gemini) models")]
    MissingGoogleKey,
}

/// One round-trip to a chat model: system instruction plus user prompt in,
/// raw completion text out.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

pub struct OpenAiBackend {
    client: openai::Client,
    model: String,
}

impl OpenAiBackend {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            client: openai::Client::new(api_key),
            model: model.to_string(),
        }
    }

    // chat-latest models reject an explicit temperature
    fn supports_temperature(&self) -> bool {
        !self.model.contains("gpt-5.2") && !self.model.contains("chat-latest")
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    #[instrument(skip(self, system, prompt), fields(model = %self.model))]
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let mut builder = self.client.agent(&self.model).preamble(system);
        if self.supports_temperature() {
            builder = builder.temperature(0.7);
        }
        let agent = builder.build();

        let response = agent
            .prompt(prompt.to_string())
            .await
            .map_err(|e| anyhow::anyhow!("Prompt error: {}", e))?;
        debug!("OpenAI returned {} characters", response.len());
        Ok(response)
    }
}

/// Gemini over its REST `generateContent` endpoint.
pub struct GeminiBackend {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.to_string(),
            model: model.to_string(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    #[instrument(skip(self, system, prompt), fields(model = %self.model))]
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let payload = json!({
            "contents": [{ "parts": [{ "text": format!("{system}\n\n{prompt}") }] }],
            "generationConfig": { "temperature": 0.7, "maxOutputTokens": 4096 },
        });

        let response = self
            .http
            .post(format!("{}/models/{}:generateContent", self.base_url, self.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gemini API error ({}): {}", status, body);
        }

        let data: serde_json::Value = response.json().await?;
        let text = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        debug!("Gemini returned {} characters", text.len());
        Ok(text)
    }
}

/// Resolves a user model selection to a ready backend.
pub struct ModelRouter {
    openai_api_key: Option<String>,
    google_api_key: Option<String>,
    fixed: Option<Arc<dyn CompletionBackend>>,
}

impl ModelRouter {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            openai_api_key: settings.openai_api_key.clone(),
            google_api_key: settings.google_api_key.clone(),
            fixed: None,
        }
    }

    /// Routes every registered selection to `backend`. Unknown selections are
    /// still rejected.
    pub fn fixed(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            openai_api_key: None,
            google_api_key: None,
            fixed: Some(backend),
        }
    }

    pub fn lookup(selection: &str) -> Result<(Provider, &'static str), ModelError> {
        MODEL_REGISTRY
            .iter()
            .find(|(id, _, _)| *id == selection)
            .map(|(_, provider, model_id)| (*provider, *model_id))
            .ok_or_else(|| ModelError::UnknownModel {
                selection: selection.to_string(),
                available: MODEL_REGISTRY
                    .iter()
                    .map(|(id, _, _)| *id)
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }

    /// Checks the selection and the provider credentials without building a
    /// client.
    pub fn check(&self, selection: &str) -> Result<(), ModelError> {
        let (provider, _) = Self::lookup(selection)?;
        if self.fixed.is_some() {
            return Ok(());
        }
        match provider {
            Provider::OpenAi if self.openai_api_key.is_none() => Err(ModelError::MissingOpenAiKey),
            Provider::Google if self.google_api_key.is_none() => Err(ModelError::MissingGoogleKey),
            _ => Ok(()),
        }
    }

    pub fn resolve(&self, selection: &str) -> Result<Arc<dyn CompletionBackend>> {
        let (provider, model_id) = Self::lookup(selection)?;
        if let Some(backend) = &self.fixed {
            return Ok(backend.clone());
        }
        match provider {
            Provider::OpenAi => {
                let key = self.openai_api_key.as_deref().ok_or(ModelError::MissingOpenAiKey)?;
                Ok(Arc::new(OpenAiBackend::new(key, model_id)))
            }
            Provider::Google => {
                let key = self.google_api_key.as_deref().ok_or(ModelError::MissingGoogleKey)?;
                Ok(Arc::new(GeminiBackend::new(key, model_id)?))
            }
        }
    }
}
