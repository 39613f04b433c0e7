#[cfg(test)]
mod tests;

pub mod interactive;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::index::DistanceMetric;
use crate::transcript::DEFAULT_SEGMENT_INTERVAL;

pub use interactive::{run_interactive_config, show_config};

pub const DEFAULT_EMBEDDING_DIMENSION: usize = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    /// Output dimensionality of the model; the collection's vector size
    /// must match it (e.g. 768 for nomic-embed-text, 1536 for
    /// text-embedding-3-small scale models)
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

impl EmbeddingConfig {
    #[inline]
    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url).map_err(|_| ConfigError::InvalidUrl(url))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
    /// Name of the vector collection holding transcript segments
    pub collection: String,
    pub metric: DistanceMetric,
}

impl Default for IndexConfig {
    #[inline]
    fn default() -> Self {
        Self {
            collection: "transcripts".to_string(),
            metric: DistanceMetric::Cosine,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    /// Segment window length in seconds
    pub interval: f64,
    /// How many sources may be in flight at once
    pub concurrency: usize,
    /// Derive point ids from (source url, window start) so re-ingesting a
    /// source overwrites its windows instead of duplicating them. With
    /// `false`, every run mints fresh ids and re-ingestion duplicates points.
    pub dedup: bool,
    /// Write each source's segments to a JSON file before upserting
    pub persist_transcripts: bool,
}

impl Default for IngestConfig {
    #[inline]
    fn default() -> Self {
        Self {
            interval: DEFAULT_SEGMENT_INTERVAL,
            concurrency: 2,
            dedup: true,
            persist_transcripts: true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(usize),
    #[error("Invalid collection name: {0:?} (cannot be empty)")]
    InvalidCollection(String),
    #[error("Invalid segment interval: {0} (must be a positive number of seconds)")]
    InvalidInterval(f64),
    #[error("Invalid concurrency: {0} (must be between 1 and 16)")]
    InvalidConcurrency(usize),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load configuration from `<config_dir>/config.toml`, falling back to
    /// defaults when the file does not exist yet.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                embedding: EmbeddingConfig::default(),
                index: IndexConfig::default(),
                ingest: IngestConfig::default(),
                base_dir: config_dir.as_ref().to_path_buf(),
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .context("Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.base_dir.join("config.toml");
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.embedding.protocol != "http" && self.embedding.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.embedding.protocol.clone()));
        }
        if self.embedding.port == 0 {
            return Err(ConfigError::InvalidPort(self.embedding.port));
        }
        if self.embedding.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding.model.clone()));
        }
        if !(64..=4096).contains(&self.embedding.dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding.dimension,
            ));
        }
        if self.index.collection.trim().is_empty() {
            return Err(ConfigError::InvalidCollection(self.index.collection.clone()));
        }
        if !self.ingest.interval.is_finite() || self.ingest.interval <= 0.0 {
            return Err(ConfigError::InvalidInterval(self.ingest.interval));
        }
        if !(1..=16).contains(&self.ingest.concurrency) {
            return Err(ConfigError::InvalidConcurrency(self.ingest.concurrency));
        }
        self.embedding.base_url()?;

        Ok(())
    }

    /// Where the LanceDB database lives
    #[inline]
    pub fn vectors_dir(&self) -> PathBuf {
        self.base_dir.join("vectors")
    }

    /// Where per-source segment files are persisted
    #[inline]
    pub fn transcripts_dir(&self) -> PathBuf {
        self.base_dir.join("transcripts")
    }
}

/// Platform config directory for clipseek, created on first use
#[inline]
pub fn get_config_dir() -> Result<PathBuf, ConfigError> {
    let base = dirs::config_dir().ok_or(ConfigError::DirectoryError)?;
    let dir = base.join("clipseek");
    fs::create_dir_all(&dir).map_err(|_| ConfigError::DirectoryError)?;
    Ok(dir)
}
