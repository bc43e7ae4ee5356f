#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::chunking::ChunkingConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub openai: OpenAiConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub chat_model: String,
    pub intent_model: String,
    pub embedding_model: String,
    pub embedding_batch_size: u32,
    pub api_key_env: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o".to_string(),
            intent_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            embedding_batch_size: 1000,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CrawlerConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_sources: usize,
    /// Always append the deterministic encyclopedia/reference seed URLs.
    /// Disable only when the caller supplies its own curated source list.
    pub include_seed_urls: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: "MeepleBot/0.1 (Board Game Researcher)".to_string(),
            timeout_seconds: 20,
            max_sources: 30,
            include_seed_urls: true,
        }
    }
}

/// Where the file-serving collaborator exposes stored topic files.
/// Only the URL-construction convention matters to the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub api_base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid request timeout: {0} (must be between 1 and 300 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid user agent (cannot be empty)")]
    InvalidUserAgent,
    #[error("Invalid chunk window: {0} words (must be between 1 and 10000)")]
    InvalidWindow(usize),
    #[error("Chunk overlap ({0}) must be smaller than the window ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                openai: OpenAiConfig::default(),
                crawler: CrawlerConfig::default(),
                chunking: ChunkingConfig::default(),
                server: ServerConfig::default(),
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
            .with_context(|| "Configuration validation failed")?;

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
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.openai.validate()?;
        self.crawler.validate()?;

        Url::parse(&self.server.api_base_url)
            .map_err(|_| ConfigError::InvalidUrl(self.server.api_base_url.clone()))?;

        if self.chunking.window_words == 0 || self.chunking.window_words > 10_000 {
            return Err(ConfigError::InvalidWindow(self.chunking.window_words));
        }
        if self.chunking.overlap_words >= self.chunking.window_words {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.overlap_words,
                self.chunking.window_words,
            ));
        }

        Ok(())
    }

    /// Path of the SQLite database holding topics, sources, and the chat log.
    #[inline]
    pub fn database_path(&self) -> PathBuf {
        self.base_dir.join("meeplebot.db")
    }

    /// Directory holding raw fetched files for one topic.
    #[inline]
    pub fn topic_store_dir(&self, topic_id: i64) -> PathBuf {
        self.base_dir
            .join("storage")
            .join("topics")
            .join(topic_id.to_string())
    }

    /// Directory holding the embedding index + chunk metadata for one topic.
    #[inline]
    pub fn topic_index_dir(&self, topic_id: i64) -> PathBuf {
        self.base_dir
            .join("storage")
            .join("index")
            .join(topic_id.to_string())
    }

    /// Browse-all-files URL for a topic, served by the file-serving collaborator.
    #[inline]
    pub fn topic_files_url(&self, topic_id: i64) -> String {
        format!(
            "{}/topics/{}/files",
            self.server.api_base_url.trim_end_matches('/'),
            topic_id
        )
    }

    /// URL of a single stored file, served by the file-serving collaborator.
    #[inline]
    pub fn stored_file_url(&self, topic_id: i64, filename: &str) -> String {
        format!(
            "{}/topics/{}/{}",
            self.server.api_base_url.trim_end_matches('/'),
            topic_id,
            filename
        )
    }
}

impl OpenAiConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.api_base).map_err(|_| ConfigError::InvalidUrl(self.api_base.clone()))?;

        for model in [&self.chat_model, &self.intent_model, &self.embedding_model] {
            if model.trim().is_empty() {
                return Err(ConfigError::InvalidModel(model.clone()));
            }
        }

        if self.embedding_batch_size == 0 || self.embedding_batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.embedding_batch_size));
        }

        Ok(())
    }

    /// API key from the configured environment variable, if set.
    #[inline]
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }

    #[inline]
    pub fn set_api_base(&mut self, api_base: String) -> Result<(), ConfigError> {
        Url::parse(&api_base).map_err(|_| ConfigError::InvalidUrl(api_base.clone()))?;
        self.api_base = api_base;
        Ok(())
    }

    #[inline]
    pub fn set_chat_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.chat_model = model;
        Ok(())
    }

    #[inline]
    pub fn set_embedding_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        if batch_size == 0 || batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(batch_size));
        }
        self.embedding_batch_size = batch_size;
        Ok(())
    }
}

impl CrawlerConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidUserAgent);
        }
        if self.timeout_seconds == 0 || self.timeout_seconds > 300 {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }
        Ok(())
    }
}

/// Resolve the platform config directory for the bot, creating it if needed.
#[inline]
pub fn get_config_dir() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or(ConfigError::DirectoryError)?;
    let dir = base.join("meeplebot");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}
