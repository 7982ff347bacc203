// Configuration management module
// TOML settings, validation and the interactive editor

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    CONFIG_FILE_NAME, ChunkingSettings, Config, ConfigError, DataSettings, DatabaseSettings, EmbeddingBackend,
    EmbeddingSettings, GeneratorSettings, MemorySettings, OllamaConfig, QuizSettings,
    RetrieverSettings, validate_chunk_bounds, validate_similarity_threshold,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
