use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use graph_flow::{InMemorySessionStorage, SessionStorage};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, instrument};

use crate::config::Settings;
use crate::error::ApiError;
use crate::models::{
    AnalysisResult, AnalyzeRequest, EditPresentationRequest, ExportPresentationRequest,
    GeneratePresentationRequest, GenerateVideoRequest, GenerateVideoResponse, HealthResponse,
    ModelsResponse, PresentationDeck,
};
use crate::prompts::build_video_prompt;
use crate::tasks::{self, keys, DeckJob, Pipeline};
use crate::tools::export::{DeckExporter, MarkdownExporter};
use crate::tools::llm::{list_models, ModelRouter};
use crate::tools::video::{HttpVideoProvider, VideoProvider};

pub const SLIDE_RANGE: std::ops::RangeInclusive<u32> = 5..=15;
pub const DECK_MINUTES_RANGE: std::ops::RangeInclusive<u32> = 3..=15;

#[derive(Clone)]
pub struct AppState {
    models: Arc<ModelRouter>,
    deck_model: String,
    analysis: Arc<Pipeline>,
    deck: Arc<Pipeline>,
    exporter: Arc<dyn DeckExporter>,
    video: Option<Arc<dyn VideoProvider>>,
}

impl AppState {
    pub fn new(models: Arc<ModelRouter>, deck_model: impl Into<String>) -> Self {
        let deck_model = deck_model.into();
        let storage: Arc<dyn SessionStorage> = Arc::new(InMemorySessionStorage::new());

        let analysis = Pipeline::new(
            "analysis_workflow",
            tasks::analysis_graph(models.clone()),
            tasks::ANALYSIS_PROMPT,
            storage.clone(),
        );
        let deck = Pipeline::new(
            "deck_workflow",
            tasks::deck_graph(models.clone(), deck_model.clone()),
            tasks::DECK_PROMPT,
            storage,
        );

        Self {
            models,
            deck_model,
            analysis: Arc::new(analysis),
            deck: Arc::new(deck),
            exporter: Arc::new(MarkdownExporter),
            video: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let models = Arc::new(ModelRouter::from_settings(settings));
        let state = Self::new(models, settings.deck_model.clone());
        match &settings.video_api_url {
            Some(url) => state.with_video(Arc::new(HttpVideoProvider::new(
                url.clone(),
                settings.video_api_key.clone(),
            ))),
            None => state,
        }
    }

    pub fn with_video(mut self, provider: Arc<dyn VideoProvider>) -> Self {
        self.video = Some(provider);
        self
    }

    pub fn with_exporter(mut self, exporter: Arc<dyn DeckExporter>) -> Self {
        self.exporter = exporter;
        self
    }

    async fn run_deck_job(&self, job: DeckJob) -> Result<PresentationDeck, ApiError> {
        self.models.check(&self.deck_model)?;

        let value = serde_json::to_value(job).map_err(|e| ApiError::Internal(e.to_string()))?;
        let session = self
            .deck
            .execute(vec![(keys::DECK_JOB, value)])
            .await
            .map_err(|e| ApiError::Internal(format!("Presentation generation failed: {}", e)))?;

        session
            .context
            .get(keys::DECK)
            .await
            .ok_or_else(|| ApiError::Internal("Presentation generation produced no deck".to_string()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/models", get(models))
        .route("/api/analyze", post(analyze))
        .route("/api/presentation/generate", post(generate_presentation))
        .route("/api/presentation/edit", post(edit_presentation))
        .route("/api/presentation/export-pptx", post(export_presentation))
        .route("/api/generate-video", post(generate_video))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(settings: &Settings) -> Result<()> {
    let app = router(AppState::from_settings(settings));

    let listener = tokio::net::TcpListener::bind(settings.bind).await?;
    info!("Raw2Ready API running on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: list_models(),
    })
}

#[instrument(skip(state, payload))]
async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalysisResult>, ApiError> {
    let Json(input) = payload?;
    info!(
        "Analyze request for '{}' in {} using {}",
        input.business_name, input.location_city, input.model_selection
    );

    state.models.check(&input.model_selection)?;

    let value = serde_json::to_value(&input).map_err(|e| ApiError::Internal(e.to_string()))?;
    let session = state
        .analysis
        .execute(vec![(keys::ANALYSIS_INPUT, value)])
        .await
        .map_err(|e| ApiError::Internal(format!("Model query failed: {}", e)))?;

    let analysis: AnalysisResult = session
        .context
        .get(keys::ANALYSIS)
        .await
        .ok_or_else(|| ApiError::Internal("Model query failed: no analysis produced".to_string()))?;

    Ok(Json(analysis))
}

#[instrument(skip(state, payload))]
async fn generate_presentation(
    State(state): State<AppState>,
    payload: Result<Json<GeneratePresentationRequest>, JsonRejection>,
) -> Result<Json<PresentationDeck>, ApiError> {
    let Json(request) = payload?;

    if !SLIDE_RANGE.contains(&request.num_slides) {
        return Err(ApiError::BadRequest(format!(
            "num_slides must be between {} and {}",
            SLIDE_RANGE.start(),
            SLIDE_RANGE.end()
        )));
    }
    if !DECK_MINUTES_RANGE.contains(&request.duration_minutes) {
        return Err(ApiError::BadRequest(format!(
            "duration_minutes must be between {} and {}",
            DECK_MINUTES_RANGE.start(),
            DECK_MINUTES_RANGE.end()
        )));
    }

    info!(
        "Generating {} slides for '{}'",
        request.num_slides, request.business_context.business_name
    );
    let deck = state
        .run_deck_job(DeckJob::Generate {
            context: request.business_context,
            num_slides: request.num_slides,
            duration_minutes: request.duration_minutes,
        })
        .await?;
    Ok(Json(deck))
}

#[instrument(skip(state, payload))]
async fn edit_presentation(
    State(state): State<AppState>,
    payload: Result<Json<EditPresentationRequest>, JsonRejection>,
) -> Result<Json<PresentationDeck>, ApiError> {
    let Json(request) = payload?;

    if request.edit_request.trim().is_empty() {
        return Err(ApiError::BadRequest("edit_request must not be empty".to_string()));
    }
    if request.current_presentation.is_empty() {
        return Err(ApiError::BadRequest("current_presentation has no slides".to_string()));
    }

    info!(
        "Editing {} slide deck for '{}'",
        request.current_presentation.len(),
        request.business_context.business_name
    );
    let deck = state
        .run_deck_job(DeckJob::Edit {
            current: request.current_presentation,
            edit_request: request.edit_request,
            context: request.business_context,
        })
        .await?;
    Ok(Json(deck))
}

#[instrument(skip(state, payload))]
async fn export_presentation(
    State(state): State<AppState>,
    payload: Result<Json<ExportPresentationRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;

    if request.presentation.slides.is_empty() {
        return Err(ApiError::BadRequest("presentation has no slides".to_string()));
    }

    let exported = state
        .exporter
        .export(&request.presentation, &request.business_name)
        .map_err(|e| ApiError::Internal(format!("Export failed: {}", e)))?;
    info!("Exported {} ({} bytes)", exported.filename, exported.bytes.len());

    let disposition = exported.content_disposition();
    Ok((
        [
            (header::CONTENT_TYPE, exported.content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        exported.bytes,
    )
        .into_response())
}

#[instrument(skip(state, payload))]
async fn generate_video(
    State(state): State<AppState>,
    payload: Result<Json<GenerateVideoRequest>, JsonRejection>,
) -> Result<Json<GenerateVideoResponse>, ApiError> {
    let Json(request) = payload?;

    if request.prompt.trim().is_empty() {
        return Err(ApiError::BadRequest("prompt must not be empty".to_string()));
    }
    if !request.time.is_finite() || request.time <= 0.0 {
        return Err(ApiError::BadRequest("time must be a positive number of minutes".to_string()));
    }

    let provider = state
        .video
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("Video generation is not configured on this server".to_string()))?;

    let duration_seconds = request.time * 60.0;
    let prompt = build_video_prompt(&request);
    let video_url = provider
        .generate(&prompt, duration_seconds)
        .await
        .map_err(|e| ApiError::Internal(format!("Video generation failed: {}", e)))?;

    info!("Video ready at {}", video_url);
    Ok(Json(GenerateVideoResponse { video_url }))
}
