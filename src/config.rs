//! Runtime settings.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! command-line overrides applied by `main`. Every key in the file is
//! optional.
//!
//! ```yaml
//! search_endpoint: https://html.duckduckgo.com/html/
//! query_hint: interview game
//! search_timeouts: { connect_ms: 9100, read_ms: 12100 }
//! content_timeouts: { connect_ms: 3100, read_ms: 10100 }
//! entity_concurrency: 4
//! url_concurrency: 4
//! cache_dir: generated
//! checkpoint_interval: 25
//! selectors:
//!   result: div.web-result
//!   anchor: a.large
//!   sponsored_class: web-result-sponsored
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Connect and read timeouts for one kind of request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Timeouts {
    pub connect_ms: u64,
    pub read_ms: u64,
}

impl Timeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }
}

/// CSS selectors for the search result page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Selectors {
    /// One search result container.
    pub result: String,
    /// The primary link inside a result container.
    pub anchor: String,
    /// Class that marks a result container as an advert.
    pub sponsored_class: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            result: "div.web-result".to_string(),
            anchor: "a.large".to_string(),
            sponsored_class: "web-result-sponsored".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// HTML search endpoint; the query is sent as `?q=`.
    pub search_endpoint: String,
    /// Terms appended to every query after the title and developer.
    pub query_hint: String,
    pub user_agent: String,
    pub search_timeouts: Timeouts,
    pub content_timeouts: Timeouts,
    /// Entities resolved at the same time.
    pub entity_concurrency: usize,
    /// Pages of one entity fetched at the same time.
    pub url_concurrency: usize,
    pub cache_dir: PathBuf,
    pub link_cache_file: String,
    pub content_cache_file: String,
    /// CSV catalog; the bundled dataset when unset.
    pub catalog_path: Option<PathBuf>,
    /// Save the cache after this many freshly resolved entities.
    pub checkpoint_interval: Option<usize>,
    pub selectors: Selectors,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            search_endpoint: "https://html.duckduckgo.com/html/".to_string(),
            query_hint: "interview game".to_string(),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            search_timeouts: Timeouts {
                connect_ms: 9_100,
                read_ms: 12_100,
            },
            content_timeouts: Timeouts {
                connect_ms: 3_100,
                read_ms: 10_100,
            },
            entity_concurrency: 4,
            url_concurrency: 4,
            cache_dir: PathBuf::from("generated"),
            link_cache_file: "roguelike-games.json".to_string(),
            content_cache_file: "roguelike-game-articles.json".to_string(),
            catalog_path: None,
            checkpoint_interval: None,
            selectors: Selectors::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or the defaults when `None`.
    #[instrument(level = "debug")]
    pub async fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        let settings = Self::from_yaml(&text).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(?settings, "Loaded settings");
        Ok(settings)
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file is a valid, all-defaults config.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Reject values that would stall or break a run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.entity_concurrency == 0 {
            return Err(ConfigError::Zero("entity_concurrency"));
        }
        if self.url_concurrency == 0 {
            return Err(ConfigError::Zero("url_concurrency"));
        }
        if self.checkpoint_interval == Some(0) {
            return Err(ConfigError::Zero("checkpoint_interval"));
        }
        Ok(())
    }

    pub fn link_cache_path(&self) -> PathBuf {
        self.cache_dir.join(&self.link_cache_file)
    }

    pub fn content_cache_path(&self) -> PathBuf {
        self.cache_dir.join(&self.content_cache_file)
    }
}
