//! Error types for every stage of the pipeline.
//!
//! Each concern owns a small `thiserror` enum. [`PipelineError`] rolls them up
//! and decides the process exit code, so `main` only has to log and map.

use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;

/// Failures while reading the reference catalog. Always fatal.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog row {row} is malformed: {source}")]
    Row {
        row: u64,
        #[source]
        source: csv::Error,
    },

    #[error("catalog row {row} has {found} fields, expected {expected}")]
    FieldCount {
        row: u64,
        found: usize,
        expected: usize,
    },

    #[error("catalog is missing its header row")]
    MissingHeader,
}

/// Failures of the cache store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize cache: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// A single outbound request that did not produce a body.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {url} could not be decoded: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A result node that looked like a link but could not be turned into one.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("result anchor has no href")]
    MissingHref,

    #[error("result href {href:?} is not a valid URL: {source}")]
    BadHref {
        href: String,
        #[source]
        source: url::ParseError,
    },
}

/// Invalid settings, whether from the YAML file or the command line.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", .path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid CSS selector for {name}: {selector:?}")]
    Selector { name: &'static str, selector: String },

    #[error("invalid search endpoint {endpoint:?}: {source}")]
    Endpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{0} must be at least 1")]
    Zero(&'static str),
}

/// Anything that aborts a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cache directory {} is not writable: {source}", .path.display())]
    Unwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Process exit code for this failure.
    ///
    /// | Code | Meaning |
    /// |------|---------|
    /// | 1 | I/O, configuration or other failure |
    /// | 2 | corrupt cache file |
    /// | 3 | malformed catalog |
    pub fn exit_code(&self) -> ExitCode {
        match self {
            PipelineError::Store(StoreError::Corrupt { .. }) => ExitCode::from(2),
            PipelineError::Catalog(_) => ExitCode::from(3),
            _ => ExitCode::FAILURE,
        }
    }
}
