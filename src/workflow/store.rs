//! Durable string-keyed storage for in-progress workflow state.
//!
//! Writes are best-effort: a failed write is logged and otherwise ignored, so
//! callers never have to handle persistence errors.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

pub mod keys {
    pub const FORM: &str = "raw2ready.form";
    pub const TERMS_ACCEPTED: &str = "raw2ready.terms_accepted";
    pub const PRESENTATION_FORM: &str = "raw2ready.presentation_form";
    pub const VIDEO_FORM: &str = "raw2ready.video_form";
    pub const DECK: &str = "raw2ready.deck";
    pub const VIDEO: &str = "raw2ready.video";
    pub const SLIDE_INDEX: &str = "raw2ready.slide_index";
    pub const ANALYSIS: &str = "raw2ready.analysis";
    pub const CONTEXT: &str = "raw2ready.context";
    pub const STAGE: &str = "raw2ready.stage";
    pub const GENERATOR: &str = "raw2ready.generator";
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = store.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring unreadable value for {}: {}", key, e);
            None
        }
    }
}

pub fn save_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    match serde_json::to_string(value) {
        Ok(raw) => store.set(key, &raw),
        Err(e) => warn!("Could not serialize value for {}: {}", key, e),
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}

/// One JSON object per profile directory, mirrored in memory and rewritten
/// atomically on every change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: DashMap<String, String>,
}

impl FileStore {
    pub const FILE_NAME: &'static str = "store.json";

    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create profile directory {}", dir.display()))?;
        let path = dir.join(Self::FILE_NAME);

        let entries = DashMap::new();
        if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(map) => {
                    for (key, value) in map {
                        entries.insert(key, value);
                    }
                }
                Err(e) => warn!("Starting with an empty store, {} is unreadable: {}", path.display(), e),
            }
        }
        debug!("Opened store {} with {} keys", path.display(), entries.len());

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) {
        if let Err(e) = self.write_file() {
            warn!("Could not persist {}: {:#}", self.path.display(), e);
        }
    }

    fn write_file(&self) -> Result<()> {
        let snapshot: BTreeMap<String, String> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let raw = serde_json::to_string_pretty(&snapshot)?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|v| v.value().clone())
    }

    fn set(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush();
    }

    fn remove(&self, key: &str) {
        if self.entries.remove(key).is_some() {
            self.flush();
        }
    }
}
