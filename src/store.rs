//! The incremental cache store.
//!
//! A store holds one whole document (the link cache or the content cache) and
//! is read once at the start of a stage and written back after the pass, or
//! at checkpoints. Stages receive the store as an explicit object so tests can
//! swap in an in-memory one.
//!
//! # On-disk format
//!
//! Pretty-printed UTF-8 JSON with non-ASCII characters left as they are.
//! Saves go to a sibling `*.tmp` file that is then renamed over the target, so
//! an interrupted write never leaves a half-written cache behind.

use crate::error::StoreError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};

/// A persisted document of type `T`.
pub trait Store<T> {
    /// Read the document. `Ok(None)` when nothing has been saved yet; an
    /// unreadable document is an error, never an empty cache.
    async fn load(&self) -> Result<Option<T>, StoreError>;

    /// Replace the persisted document with `value`.
    async fn save(&self, value: &T) -> Result<(), StoreError>;
}

/// [`Store`] backed by a JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore<T> {
    path: PathBuf,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl<T> Store<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<T>, StoreError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No cache file yet");
                return Ok(None);
            }
            Err(e) => return Err(self.io_error(e)),
        };

        let value = serde_json::from_str(&text).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        debug!(bytes = text.len(), "Loaded cache file");
        Ok(Some(value))
    }

    /// Write `value` as pretty-printed JSON.
    ///
    /// The document goes to a sibling `*.tmp` file first, which is then
    /// renamed over the target, so readers only ever see a complete file.
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The value cannot be serialized
    /// - The directory, the temporary file, or the rename fails
    #[instrument(level = "debug", skip_all, fields(path = %self.path.display()))]
    async fn save(&self, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(value).map_err(StoreError::Serialize)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }

        let tmp = self.temp_path();
        fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| self.io_error(e))?;

        info!(bytes = json.len(), "Saved cache file");
        Ok(())
    }
}

/// In-memory [`Store`] for tests. Values round-trip through JSON so the same
/// serialization rules apply as on disk.
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    pub struct MemoryStore<T> {
        json: Mutex<Option<String>>,
        saves: AtomicUsize,
        _doc: PhantomData<fn() -> T>,
    }

    impl<T: Serialize> MemoryStore<T> {
        pub fn new() -> Self {
            Self {
                json: Mutex::new(None),
                saves: AtomicUsize::new(0),
                _doc: PhantomData,
            }
        }

        pub fn with_value(value: &T) -> Self {
            let store = Self::new();
            *store.json.lock().unwrap() = Some(serde_json::to_string_pretty(value).unwrap());
            store
        }

        /// A store whose document is `raw`, valid or not.
        pub fn with_raw(raw: &str) -> Self {
            let store = Self::new();
            *store.json.lock().unwrap() = Some(raw.to_string());
            store
        }

        pub fn raw(&self) -> Option<String> {
            self.json.lock().unwrap().clone()
        }

        pub fn save_count(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }
    }

    impl<T> Store<T> for MemoryStore<T>
    where
        T: Serialize + DeserializeOwned,
    {
        async fn load(&self) -> Result<Option<T>, StoreError> {
            let raw = self.json.lock().unwrap().clone();
            raw.map(|raw| {
                serde_json::from_str(&raw).map_err(|source| StoreError::Corrupt {
                    path: PathBuf::from("<memory>"),
                    source,
                })
            })
            .transpose()
        }

        async fn save(&self, value: &T) -> Result<(), StoreError> {
            let json = serde_json::to_string_pretty(value).map_err(StoreError::Serialize)?;
            *self.json.lock().unwrap() = Some(json);
            self.saves.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
