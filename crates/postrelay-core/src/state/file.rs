// # File Dedupe Store
//
// File-based implementation of DedupeStore.
//
// ## Purpose
//
// Persists the last announced key across runs. The file is read once when a
// run starts and replaced at most once per delivered item.
//
// ## Crash Safety
//
// - Atomic writes: new state is written to `<path>.tmp`, synced, then renamed
// - Corruption is reported, never repaired: an unparseable record is
//   `StateUnavailable` and the run stops
//
// ## File Format
//
// ```json
// {
//   "version": "1",
//   "last_seen_key": "C1a2b3c4d5",
//   "updated_at": "2026-01-09T12:00:00Z"
// }
// ```
//
// Paths ending in `.txt` use the legacy plain-text format: the whole file is
// the key.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::Error;
use crate::config::StateStoreConfig;
use crate::traits::dedupe_store::{DedupeState, DedupeStore, DedupeStoreFactory};

/// State file format version
const STATE_FILE_VERSION: &str = "1";

/// On-disk encoding of the record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFileFormat {
    /// Versioned JSON document
    Json,
    /// Bare key, one line
    PlainText,
}

impl StateFileFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("txt") => StateFileFormat::PlainText,
            _ => StateFileFormat::Json,
        }
    }
}

/// Serializable state file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFile {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    last_seen_key: Option<String>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

/// File-based dedupe store
///
/// # Example
///
/// ```rust,no_run
/// use postrelay_core::state::FileDedupeStore;
/// use postrelay_core::traits::{DedupeState, DedupeStore};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileDedupeStore::new("/var/lib/postrelay/state.json");
///
///     store.save(&DedupeState::seen("abc123")).await?;
///
///     let state = store.load().await?;
///     assert_eq!(state.last_seen_key.as_deref(), Some("abc123"));
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileDedupeStore {
    path: PathBuf,
    format: StateFileFormat,
}

impl FileDedupeStore {
    /// Create a store for `path`, picking the format from its extension
    ///
    /// No I/O happens until `load()` or `save()`.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let format = StateFileFormat::from_path(&path);
        Self { path, format }
    }

    /// Create a store with an explicit format
    pub fn with_format<P: AsRef<Path>>(path: P, format: StateFileFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
        }
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn decode(&self, content: &str) -> Result<DedupeState, Error> {
        if content.trim().is_empty() {
            tracing::debug!("State file {} is empty", self.path.display());
            return Ok(DedupeState::default());
        }

        match self.format {
            StateFileFormat::PlainText => Ok(DedupeState {
                last_seen_key: Some(content.trim().to_string()),
                updated_at: None,
            }),
            StateFileFormat::Json => {
                let file: StateFile = serde_json::from_str(content).map_err(|e| {
                    Error::state_unavailable(format!(
                        "Failed to parse state file {}: {}",
                        self.path.display(),
                        e
                    ))
                })?;

                if let Some(version) = file.version.as_deref()
                    && version != STATE_FILE_VERSION
                {
                    tracing::warn!(
                        "State file version mismatch: expected {}, got {}. Attempting to load anyway.",
                        STATE_FILE_VERSION,
                        version
                    );
                }

                Ok(DedupeState {
                    last_seen_key: file
                        .last_seen_key
                        .map(|k| k.trim().to_string())
                        .filter(|k| !k.is_empty()),
                    updated_at: file.updated_at,
                })
            }
        }
    }

    fn encode(&self, state: &DedupeState) -> Result<String, Error> {
        match self.format {
            StateFileFormat::PlainText => Ok(state.last_seen_key.clone().unwrap_or_default()),
            StateFileFormat::Json => {
                let file = StateFile {
                    version: Some(STATE_FILE_VERSION.to_string()),
                    last_seen_key: state.last_seen_key.clone(),
                    updated_at: state.updated_at,
                };
                serde_json::to_string_pretty(&file)
                    .map_err(|e| Error::Other(format!("Failed to serialize state: {}", e)))
            }
        }
    }

    /// Get path to temporary file for atomic writes
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

#[async_trait]
impl DedupeStore for FileDedupeStore {
    async fn load(&self) -> Result<DedupeState, Error> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("State file does not exist: {}", self.path.display());
                return Ok(DedupeState::default());
            }
            Err(e) => {
                return Err(Error::state_unavailable(format!(
                    "Failed to read state file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let state = self.decode(&content)?;
        tracing::debug!(
            "Loaded state from {}: last_seen_key={:?}",
            self.path.display(),
            state.last_seen_key
        );
        Ok(state)
    }

    async fn save(&self, state: &DedupeState) -> Result<(), Error> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::Other(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let body = self.encode(state)?;

        // Write to temporary file first
        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                Error::Other(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(body.as_bytes()).await.map_err(|e| {
                Error::Other(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                Error::Other(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        // Atomic rename (temp -> actual)
        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::Other(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }
}

/// Factory for file stores (`StateStoreConfig::File`)
pub struct FileDedupeStoreFactory;

impl DedupeStoreFactory for FileDedupeStoreFactory {
    fn create(&self, config: &StateStoreConfig) -> Result<Box<dyn DedupeStore>, Error> {
        match config {
            StateStoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(Error::config("State file path cannot be empty"));
                }
                Ok(Box::new(FileDedupeStore::new(path)))
            }
            _ => Err(Error::config("Invalid config for file state store")),
        }
    }
}
