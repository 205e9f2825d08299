use std::path::{Path, PathBuf};

use reqwest::header::CONTENT_DISPOSITION;
use reqwest::Response;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::error::ClientError;
use crate::models::{
    AnalysisResult, AnalyzeRequest, EditPresentationRequest, ExportPresentationRequest,
    GeneratePresentationRequest, GenerateVideoRequest, GenerateVideoResponse, HealthResponse,
    ModelsResponse, PresentationDeck,
};

pub const DEFAULT_DECK_FILENAME: &str = "pitch-deck.pptx";
pub const DEFAULT_VIDEO_FILENAME: &str = "pitch-video.mp4";

/// A downloaded file held in memory until the user saves it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ExportedFile {
    /// Writes the file into `dir` and returns the path used. An existing
    /// file is never overwritten; a numeric suffix is added instead.
    pub fn save_into(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;

        let candidate = dir.join(&self.filename);
        let path = if candidate.exists() {
            let stem = candidate
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "download".to_string());
            let ext = candidate
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            (1..)
                .map(|n| dir.join(format!("{stem}-{n}{ext}")))
                .find(|p| !p.exists())
                .unwrap_or(candidate)
        } else {
            candidate
        };

        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// HTTP client for the Raw2Ready backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        self.get_json("/health").await
    }

    pub async fn models(&self) -> Result<ModelsResponse, ClientError> {
        self.get_json("/api/models").await
    }

    #[instrument(skip(self, request), fields(business = %request.business_name))]
    pub async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalysisResult, ClientError> {
        self.post_json("/api/analyze", request).await
    }

    pub async fn generate_presentation(
        &self,
        request: &GeneratePresentationRequest,
    ) -> Result<PresentationDeck, ClientError> {
        self.post_json("/api/presentation/generate", request).await
    }

    pub async fn edit_presentation(
        &self,
        request: &EditPresentationRequest,
    ) -> Result<PresentationDeck, ClientError> {
        self.post_json("/api/presentation/edit", request).await
    }

    pub async fn export_presentation(
        &self,
        request: &ExportPresentationRequest,
    ) -> Result<ExportedFile, ClientError> {
        let response = self
            .http
            .post(self.url("/api/presentation/export-pptx"))
            .json(request)
            .send()
            .await
            .map_err(ClientError::Unreachable)?;
        let response = check(response).await?;

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| DEFAULT_DECK_FILENAME.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        debug!("Downloaded {} ({} bytes)", filename, bytes.len());
        Ok(ExportedFile {
            filename,
            bytes: bytes.to_vec(),
        })
    }

    pub async fn generate_video(
        &self,
        request: &GenerateVideoRequest,
    ) -> Result<GenerateVideoResponse, ClientError> {
        self.post_json("/api/generate-video", request).await
    }

    /// Fetches a remote resource (typically a generated video) as bytes.
    pub async fn download(&self, url: &str) -> Result<ExportedFile, ClientError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ClientError::Unreachable)?;
        let response = check(response).await?;

        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_disposition)
            .or_else(|| filename_from_url(url))
            .unwrap_or_else(|| DEFAULT_VIDEO_FILENAME.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        Ok(ExportedFile {
            filename,
            bytes: bytes.to_vec(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let response = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(ClientError::Unreachable)?;
        decode(check(response).await?).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let response = self
            .http
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(ClientError::Unreachable)?;
        decode(check(response).await?).await
    }
}

async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = detail_message(status.as_u16(), &body);
    debug!(status = status.as_u16(), "Server rejected request: {}", detail);
    Err(ClientError::Server {
        status: status.as_u16(),
        detail,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    response
        .json()
        .await
        .map_err(|e| ClientError::Decode(e.to_string()))
}

/// Human-readable message from an error body's `detail`, which is either a
/// string or a list of sub-errors.
pub fn detail_message(status: u16, body: &str) -> String {
    let fallback = || format!("Request failed with status {status}");

    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback();
    };

    match value.get("detail") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Array(items)) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Object(obj) => match obj.get("msg").and_then(Value::as_str) {
                        Some(msg) => {
                            let field = obj
                                .get("loc")
                                .and_then(Value::as_array)
                                .and_then(|loc| loc.last())
                                .and_then(Value::as_str);
                            Some(match field {
                                Some(field) => format!("{field}: {msg}"),
                                None => msg.to_string(),
                            })
                        }
                        None => Some(item.to_string()),
                    },
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            if parts.is_empty() {
                fallback()
            } else {
                parts.join("; ")
            }
        }
        _ => fallback(),
    }
}

/// Extracts the filename from a `Content-Disposition` header value.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let params: Vec<&str> = value.split(';').map(str::trim).collect();

    // filename*=charset'lang'value, percent-encoded
    let extended = params.iter().find_map(|p| {
        let value = p.strip_prefix("filename*=")?;
        let encoded = value.rsplit("''").next().unwrap_or(value).trim_matches('"');
        urlencoding::decode(encoded).ok().map(|name| name.into_owned())
    });
    let plain = params
        .iter()
        .find_map(|p| p.strip_prefix("filename="))
        .map(|name| name.trim().trim_matches('"').to_string());

    extended
        .or(plain)
        .map(|name| name.rsplit(['/', '\\']).next().unwrap_or(&name).trim().to_string())
        .filter(|name| !name.is_empty())
}

fn filename_from_url(url: &str) -> Option<String> {
    let parsed = reqwest::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| {
            let name = urlencoding::decode(segment)
                .map(|name| name.into_owned())
                .unwrap_or_else(|_| segment.to_string());
            name.rsplit(['/', '\\']).next().unwrap_or(&name).to_string()
        })
        .filter(|name| !name.is_empty())
}
