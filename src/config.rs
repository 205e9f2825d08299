use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context as _, Result};

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_DECK_MODEL: &str = "chatgpt-latest";

/// Settings shared by the server and the workflow front end.
///
/// Values come from the process environment. A `.env` file in the working
/// directory is loaded first when present.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub google_api_key: Option<String>,
    pub bind: SocketAddr,
    pub deck_model: String,
    pub video_api_url: Option<String>,
    pub video_api_key: Option<String>,
    pub api_url: String,
    pub profile_dir: PathBuf,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let bind = var("RAW2READY_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind
            .parse()
            .with_context(|| format!("RAW2READY_BIND is not a socket address: {bind}"))?;

        Ok(Self {
            openai_api_key: var("OPENAI_API_KEY"),
            google_api_key: var("GOOGLE_API_KEY"),
            bind,
            deck_model: var("RAW2READY_DECK_MODEL").unwrap_or_else(|| DEFAULT_DECK_MODEL.to_string()),
            video_api_url: var("VIDEO_API_URL"),
            video_api_key: var("VIDEO_API_KEY"),
            api_url: var("RAW2READY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            profile_dir: var("RAW2READY_PROFILE")
                .map(PathBuf::from)
                .unwrap_or_else(default_profile_dir),
        })
    }
}

fn default_profile_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("raw2ready")
}
