
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::{Result, StudyError};

pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub ollama: OllamaConfig,
    pub generator: GeneratorSettings,
    pub database: DatabaseSettings,
    pub retriever: RetrieverSettings,
    pub quiz: QuizSettings,
    pub memory: MemorySettings,
    pub data: DataSettings,
    /// Directory relative paths are resolved against (the config file's directory)
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkingSettings {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    #[default]
    Ollama,
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingSettings {
    pub backend: EmbeddingBackend,
    pub model_name: String,
    pub batch_size: u32,
    /// Output dimension of the hashing backend; ignored by Ollama
    pub dimension: u32,
    /// Number of embedding batches in flight during a build
    pub parallel_batches: usize,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Ollama,
            model_name: "nomic-embed-text:latest".to_string(),
            batch_size: 16,
            dimension: 384,
            parallel_batches: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            timeout_seconds: 120,
            retry_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorSettings {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub repeat_penalty: f32,
    pub max_tokens: u32,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            model: "llama3.1:8b".to_string(),
            temperature: 0.7,
            top_p: 0.95,
            repeat_penalty: 1.1,
            max_tokens: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSettings {
    pub persist_directory: PathBuf,
    pub collection_name: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            persist_directory: PathBuf::from("vector_store"),
            collection_name: "study_notes".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct RetrieverSettings {
    pub k: usize,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self { k: 4 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct QuizSettings {
    pub similarity_threshold: f32,
    pub question_count: usize,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.85,
            question_count: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct MemorySettings {
    pub sqlite_database_path: PathBuf,
    pub limit: u32,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            sqlite_database_path: PathBuf::from("memory.db"),
            limit: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DataSettings {
    pub processed_path: PathBuf,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            processed_path: PathBuf::from("data/processed"),
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
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid timeout: {0} (must be between 1 and 3600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid embedding dimension: {0} (must be between 8 and 8192)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid embedding parallelism: {0} (must be between 1 and 64)")]
    InvalidParallelism(usize),
    #[error("Invalid chunk size: {0} (must be greater than 0)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid collection name: {0:?} (use letters, digits, '_', '-' or '.')")]
    InvalidCollectionName(String),
    #[error("Invalid retriever k: {0} (must be at least 1)")]
    InvalidRetrieverK(usize),
    #[error("Invalid similarity threshold: {0} (must be within [0, 1])")]
    InvalidSimilarityThreshold(f32),
    #[error("Invalid quiz question count: {0} (must be between 1 and 50)")]
    InvalidQuestionCount(usize),
    #[error("Invalid weak topic limit: {0} (must be at least 1)")]
    InvalidMemoryLimit(u32),
    #[error("Invalid sampling parameter {0}: {1}")]
    InvalidSampling(&'static str, f32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Default configuration directory (`<platform config dir>/study-assistant`)
    #[inline]
    pub fn config_dir() -> std::result::Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join("study-assistant"))
            .ok_or(ConfigError::DirectoryError)
    }

    /// Load from the default configuration directory
    #[inline]
    pub fn load() -> Result<Self> {
        let config_path = Self::config_dir()?.join(CONFIG_FILE_NAME);
        Self::load_from(config_path)
    }

    /// Load and validate a configuration file. A missing file yields the defaults,
    /// with relative paths anchored at the file's directory.
    #[inline]
    pub fn load_from<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let config_path = config_path.as_ref();
        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        if !config_path.exists() {
            let config = Self {
                base_dir,
                ..Self::default()
            };
            config.validate()?;
            return Ok(config);
        }

        let content = fs::read_to_string(config_path).map_err(|e| {
            StudyError::Config(format!(
                "Failed to read config file {}: {}",
                config_path.display(),
                e
            ))
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| {
            StudyError::Config(format!(
                "Failed to parse config file {}: {}",
                config_path.display(),
                e
            ))
        })?;
        config.base_dir = base_dir;

        config.validate()?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()?;

        fs::create_dir_all(&self.base_dir)?;

        let content = toml::to_string_pretty(self).map_err(ConfigError::from)?;
        fs::write(self.config_file_path(), content)?;

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILE_NAME)
    }

    #[inline]
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        self.validate_chunking()?;
        self.validate_embedding()?;
        self.ollama.validate()?;
        self.generator.validate()?;
        validate_collection_name(&self.database.collection_name)?;

        if self.retriever.k == 0 {
            return Err(ConfigError::InvalidRetrieverK(self.retriever.k));
        }

        validate_similarity_threshold(self.quiz.similarity_threshold)?;

        if !(1..=50).contains(&self.quiz.question_count) {
            return Err(ConfigError::InvalidQuestionCount(self.quiz.question_count));
        }

        if self.memory.limit == 0 {
            return Err(ConfigError::InvalidMemoryLimit(self.memory.limit));
        }

        Ok(())
    }

    fn validate_chunking(&self) -> std::result::Result<(), ConfigError> {
        validate_chunk_bounds(self.chunking.chunk_size, self.chunking.chunk_overlap)
    }

    fn validate_embedding(&self) -> std::result::Result<(), ConfigError> {
        let embedding = &self.embedding;

        if embedding.backend == EmbeddingBackend::Ollama && embedding.model_name.trim().is_empty()
        {
            return Err(ConfigError::InvalidModel(embedding.model_name.clone()));
        }

        if embedding.batch_size == 0 || embedding.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(embedding.batch_size));
        }

        if embedding.backend == EmbeddingBackend::Hashing
            && !(8..=8192).contains(&embedding.dimension)
        {
            return Err(ConfigError::InvalidEmbeddingDimension(embedding.dimension));
        }

        if !(1..=64).contains(&embedding.parallel_batches) {
            return Err(ConfigError::InvalidParallelism(embedding.parallel_batches));
        }

        Ok(())
    }

    /// Resolve a configured path against the configuration directory
    #[inline]
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    #[inline]
    pub fn persist_directory(&self) -> PathBuf {
        self.resolve_path(&self.database.persist_directory)
    }

    #[inline]
    pub fn processed_path(&self) -> PathBuf {
        self.resolve_path(&self.data.processed_path)
    }

    #[inline]
    pub fn sqlite_database_path(&self) -> PathBuf {
        self.resolve_path(&self.memory.sqlite_database_path)
    }

    /// Model identifier the configured embedding backend reports
    #[inline]
    pub fn embedding_model_id(&self) -> String {
        match self.embedding.backend {
            EmbeddingBackend::Ollama => self.embedding.model_name.clone(),
            EmbeddingBackend::Hashing => {
                crate::embeddings::hashing::model_id(self.embedding.dimension as usize)
            }
        }
    }

    #[inline]
    pub fn ollama_url(&self) -> std::result::Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

/// Check the chunk size / overlap pair used by the chunker
#[inline]
pub fn validate_chunk_bounds(
    chunk_size: usize,
    chunk_overlap: usize,
) -> std::result::Result<(), ConfigError> {
    if chunk_size == 0 {
        return Err(ConfigError::InvalidChunkSize(chunk_size));
    }
    if chunk_overlap >= chunk_size {
        return Err(ConfigError::OverlapTooLarge(chunk_overlap, chunk_size));
    }
    Ok(())
}

/// Thresholds are compared against cosine similarity and never clamped
#[inline]
pub fn validate_similarity_threshold(threshold: f32) -> std::result::Result<(), ConfigError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(ConfigError::InvalidSimilarityThreshold(threshold))
    }
}

#[inline]
pub fn validate_collection_name(name: &str) -> std::result::Result<(), ConfigError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidCollectionName(name.to_string()))
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        self.ollama_url()?;

        if !(1..=3600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> std::result::Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> std::result::Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> std::result::Result<(), ConfigError> {
        let temp_config = Self {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> std::result::Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }
}

impl GeneratorSettings {
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidSampling("temperature", self.temperature));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(ConfigError::InvalidSampling("top_p", self.top_p));
        }
        if !(self.repeat_penalty > 0.0) {
            return Err(ConfigError::InvalidSampling(
                "repeat_penalty",
                self.repeat_penalty,
            ));
        }
        Ok(())
    }
}
