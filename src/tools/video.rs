use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// External text-to-video service.
#[async_trait]
pub trait VideoProvider: Send + Sync {
    /// Returns the URL of the hosted clip.
    async fn generate(&self, prompt: &str, duration_seconds: f64) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct VideoJobRequest<'a> {
    prompt: &'a str,
    duration_seconds: f64,
}

#[derive(Debug, Deserialize)]
struct VideoJobResponse {
    video_url: Option<String>,
    url: Option<String>,
}

/// Posts `{prompt, duration_seconds}` to a configured endpoint and expects
/// `{video_url}` (or `{url}`) back.
pub struct HttpVideoProvider {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpVideoProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl VideoProvider for HttpVideoProvider {
    #[instrument(skip(self, prompt))]
    async fn generate(&self, prompt: &str, duration_seconds: f64) -> Result<String> {
        info!("Requesting {:.1}s video clip", duration_seconds);

        let mut request = self.http.post(&self.endpoint).json(&VideoJobRequest {
            prompt,
            duration_seconds,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Video request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Video provider error ({}): {}", status, body);
        }

        let job: VideoJobResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse video response: {}", e))?;

        job.video_url
            .or(job.url)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Video provider returned no URL"))
    }
}
