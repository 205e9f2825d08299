use std::ops::RangeInclusive;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use super::api::{ApiClient, ExportedFile};
use super::store::{keys, load_json, save_json, KeyValueStore};
use super::Validation;
use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{BusinessContext, GenerateVideoRequest, GeneratedVideo};

pub const SECONDS: RangeInclusive<u32> = 6..=10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoInputs {
    pub prompt: String,
    pub duration_seconds: u32,
}

impl Default for VideoInputs {
    fn default() -> Self {
        Self {
            prompt: String::new(),
            duration_seconds: 8,
        }
    }
}

impl VideoInputs {
    pub fn validate(&self) -> Validation {
        let mut validation = Validation::default();
        if self.prompt.trim().is_empty() {
            validation.reject("prompt", "Describe the video you want");
        }
        if !SECONDS.contains(&self.duration_seconds) {
            validation.reject(
                "duration_seconds",
                format!("Video length must be between {} and {} seconds", SECONDS.start(), SECONDS.end()),
            );
        }
        validation
    }

    fn to_request(&self, context: &BusinessContext) -> GenerateVideoRequest {
        let non_blank = |s: &str| (!s.trim().is_empty()).then(|| s.to_string());
        GenerateVideoRequest {
            time: f64::from(self.duration_seconds) / 60.0,
            prompt: self.prompt.trim().to_string(),
            business_name: non_blank(&context.business_name),
            raw_idea: non_blank(&context.raw_idea),
            problem: context.problem.clone(),
            target_audience: context.target_audience.clone(),
            location_city: non_blank(&context.location_city),
            country: non_blank(&context.country),
        }
    }
}

pub struct VideoFlow {
    store: Arc<dyn KeyValueStore>,
    inputs: VideoInputs,
    video: Option<GeneratedVideo>,
    error: Option<String>,
}

impl VideoFlow {
    pub fn open(store: Arc<dyn KeyValueStore>) -> Self {
        let inputs = load_json(store.as_ref(), keys::VIDEO_FORM).unwrap_or_default();
        let video = load_json(store.as_ref(), keys::VIDEO);
        Self {
            store,
            inputs,
            video,
            error: None,
        }
    }

    pub fn inputs(&self) -> &VideoInputs {
        &self.inputs
    }

    pub fn set_inputs(&mut self, inputs: VideoInputs) {
        save_json(self.store.as_ref(), keys::VIDEO_FORM, &inputs);
        self.inputs = inputs;
    }

    pub fn video(&self) -> Option<&GeneratedVideo> {
        self.video.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Requests a clip and keeps it as the current video, replacing any
    /// earlier one.
    #[instrument(skip(self, api, context), fields(business = %context.business_name))]
    pub async fn generate(
        &mut self,
        api: &ApiClient,
        context: &BusinessContext,
    ) -> WorkflowResult<&GeneratedVideo> {
        self.inputs.validate().into_result()?;
        self.error = None;

        let request = self.inputs.to_request(context);
        info!("Requesting a {} second video", self.inputs.duration_seconds);

        match api.generate_video(&request).await {
            Ok(response) => {
                let video = GeneratedVideo {
                    video_url: response.video_url,
                    prompt: request.prompt,
                    duration_seconds: self.inputs.duration_seconds,
                    generated_at: Utc::now(),
                };
                save_json(self.store.as_ref(), keys::VIDEO, &video);
                Ok(self.video.insert(video))
            }
            Err(e) => {
                warn!("Video generation failed: {}", e);
                self.error = Some(e.to_string());
                Err(e.into())
            }
        }
    }

    /// Fetches the current video's bytes for saving.
    pub async fn download(&mut self, api: &ApiClient) -> WorkflowResult<ExportedFile> {
        let url = self
            .video
            .as_ref()
            .map(|v| v.video_url.clone())
            .ok_or(WorkflowError::NoVideo)?;
        self.error = None;

        api.download(&url).await.map_err(|e| {
            warn!("Video download failed: {}", e);
            self.error = Some(e.to_string());
            e.into()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::store::MemoryStore;

    fn inputs(prompt: &str, secs: u32) -> VideoInputs {
        VideoInputs {
            prompt: prompt.to_string(),
            duration_seconds: secs,
        }
    }

    #[test]
    fn duration_and_prompt_rules() {
        assert!(inputs("Fresh bread at dawn", 6).validate().is_valid());
        assert!(inputs("Fresh bread at dawn", 10).validate().is_valid());

        let validation = inputs("Fresh bread at dawn", 3).validate();
        assert!(validation.error("duration_seconds").is_some());
        assert!(validation.error("prompt").is_none());

        let validation = inputs("  ", 11).validate();
        assert_eq!(validation.field_errors().len(), 2);
    }

    #[test]
    fn request_time_is_in_minutes() {
        let context = BusinessContext {
            business_name: "Pain Paris".to_string(),
            country: "France".to_string(),
            ..Default::default()
        };
        let request = inputs("Fresh bread", 6).to_request(&context);
        assert!((request.time - 0.1).abs() < f64::EPSILON);
        assert_eq!(request.business_name.as_deref(), Some("Pain Paris"));
        assert_eq!(request.location_city, None);
    }

    #[tokio::test]
    async fn three_seconds_is_rejected_before_any_request() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut flow = VideoFlow::open(store);
        flow.set_inputs(inputs("Fresh bread at dawn", 3));
        let api = ApiClient::new("http://127.0.0.1:9");

        let err = flow.generate(&api, &BusinessContext::default()).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Invalid(_)));
        assert!(flow.error().is_none());
        assert!(flow.video().is_none());
    }

    #[tokio::test]
    async fn download_needs_a_video() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let mut flow = VideoFlow::open(store);
        let api = ApiClient::new("http://127.0.0.1:9");
        assert!(matches!(flow.download(&api).await, Err(WorkflowError::NoVideo)));
    }

    #[test]
    fn inputs_and_video_survive_reopen() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let video = GeneratedVideo {
            video_url: "https://cdn.test/v.mp4".to_string(),
            prompt: "Fresh bread".to_string(),
            duration_seconds: 8,
            generated_at: Utc::now(),
        };
        save_json(store.as_ref(), keys::VIDEO, &video);
        VideoFlow::open(store.clone()).set_inputs(inputs("Fresh bread", 9));

        let flow = VideoFlow::open(store);
        assert_eq!(flow.inputs(), &inputs("Fresh bread", 9));
        assert_eq!(flow.video(), Some(&video));
    }
}
