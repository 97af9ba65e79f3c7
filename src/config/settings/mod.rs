
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;

/// Environment variable holding the Mistral API key
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";
/// Environment variable overriding the base directory
pub const HOME_ENV: &str = "NEWS_RESEARCH_HOME";

/// Port Ollama listens on unless told otherwise
pub const DEFAULT_OLLAMA_PORT: u16 = 11434;

const CONFIG_FILE_NAME: &str = "config.toml";
const VECTOR_INDEX_DIR_NAME: &str = "vector_index";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub model: String,
    pub batch_size: u32,
    pub embedding_dimension: u32,
    pub retry_attempts: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: DEFAULT_OLLAMA_PORT,
            model: "all-minilm:latest".to_string(),
            batch_size: 16,
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            retry_attempts: 1,
        }
    }
}

/// Hosted chat-completion settings. The API key is never stored here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.mistral.ai/v1".to_string(),
            model: "mistral-small-latest".to_string(),
            temperature: 0.7,
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest chunks handed to the LLM
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Footer line shown in the corner of every page
    pub signature: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8501,
            signature: "Made by : News Research Tool".to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Mistral API key is missing. Set MISTRAL_API_KEY in your environment or `.env` file.")]
    MissingApiKey,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("Invalid LLM timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid top_k: {0} (must be between 1 and 20)")]
    InvalidTopK(usize),
    #[error("Invalid server host: {0} (cannot be empty)")]
    InvalidServerHost(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// The LLM provider credential, read from the environment only
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Read the key from `MISTRAL_API_KEY`. Blank values count as missing.
    #[inline]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_value(std::env::var(API_KEY_ENV).ok())
    }

    #[inline]
    pub fn from_value(value: Option<String>) -> Result<Self, ConfigError> {
        match value {
            Some(key) if !key.trim().is_empty() => Ok(Self(key.trim().to_string())),
            _ => Err(ConfigError::MissingApiKey),
        }
    }

    #[inline]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
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

    /// Load from the default base directory
    #[inline]
    pub fn load_default() -> Result<Self> {
        let dir = Self::config_dir().context("Failed to resolve configuration directory")?;
        Self::load(dir)
    }

    /// `NEWS_RESEARCH_HOME` if set, otherwise `~/.news-research`.
    ///
    /// A relative override is resolved against the working directory.
    #[inline]
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        if let Some(home) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
            return std::path::absolute(PathBuf::from(home))
                .map_err(|_| ConfigError::DirectoryError);
        }
        dirs::home_dir()
            .map(|home| home.join(".news-research"))
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ollama.validate()?;
        self.llm.validate()?;

        if !(1..=20).contains(&self.retrieval.top_k) {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        if self.server.host.trim().is_empty() {
            return Err(ConfigError::InvalidServerHost(self.server.host.clone()));
        }
        if self.server.port == 0 {
            return Err(ConfigError::InvalidPort(self.server.port));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join(CONFIG_FILE_NAME)
    }

    /// The fixed location of the persisted vector index
    #[inline]
    pub fn vector_index_path(&self) -> PathBuf {
        self.get_base_dir().join(VECTOR_INDEX_DIR_NAME)
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.protocol.as_str(), "http" | "https") {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }
        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }
        self.ollama_url()?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }
        if !(1..=1000).contains(&self.batch_size) {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }
        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }
        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let base = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&base).map_err(|_| ConfigError::InvalidUrl(base))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        self.update(|c| c.protocol = protocol)
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        self.update(|c| c.host = host)
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        self.update(|c| c.port = port)
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        self.update(|c| c.model = model)
    }

    pub fn set_batch_size(&mut self, batch_size: u32) -> Result<(), ConfigError> {
        self.update(|c| c.batch_size = batch_size)
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        self.update(|c| c.embedding_dimension = dimension)
    }

    /// Apply `change` only if the result still validates
    fn update(&mut self, change: impl FnOnce(&mut Self)) -> Result<(), ConfigError> {
        let mut candidate = self.clone();
        change(&mut candidate);
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }
}

impl LlmConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.api_base)
            .map_err(|_| ConfigError::InvalidUrl(self.api_base.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidTemperature(self.temperature));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        Ok(())
    }

    /// Endpoint for chat completions, tolerant of a trailing slash on `api_base`
    pub fn chat_completions_url(&self) -> Result<Url, ConfigError> {
        let joined = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        Url::parse(&joined).map_err(|_| ConfigError::InvalidUrl(joined))
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        let candidate = Self {
            model,
            ..self.clone()
        };
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: f32) -> Result<(), ConfigError> {
        let candidate = Self {
            temperature,
            ..self.clone()
        };
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }
}
