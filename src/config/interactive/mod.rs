
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{Config, ConfigError, EmbeddingBackend, OllamaConfig};

#[inline]
pub fn run_interactive_config(config_path: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Study Assistant Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_path);

    eprintln!("{}", style("Ollama Connection").bold().yellow());
    eprintln!("Configure the Ollama instance used for embeddings and answers.");
    eprintln!();
    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Models").bold().yellow());
    configure_models(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config.ollama) {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before building the index.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Backend: {}", style(format!("{:?}", config.embedding.backend)).cyan());
    eprintln!("  Model: {}", style(config.embedding_model_id()).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());

    eprintln!("{}", style("Generator:").bold().yellow());
    eprintln!("  Model: {}", style(&config.generator.model).cyan());
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!("{}", style("Storage:").bold().yellow());
    eprintln!(
        "  Vector Store: {}",
        style(config.persist_directory().display()).cyan()
    );
    eprintln!(
        "  Collection: {}",
        style(&config.database.collection_name).cyan()
    );
    eprintln!(
        "  Mistake Log: {}",
        style(config.sqlite_database_path().display()).cyan()
    );
    eprintln!(
        "  Processed Notes: {}",
        style(config.processed_path().display()).cyan()
    );

    eprintln!("{}", style("Retrieval & Quiz:").bold().yellow());
    eprintln!("  k: {}", style(config.retriever.k).cyan());
    eprintln!(
        "  Similarity Threshold: {}",
        style(config.quiz.similarity_threshold).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_path: &Path) -> Config {
    match Config::load_from(config_path) {
        Ok(config) if config_path.exists() => {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        }
        Ok(config) => {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            config
        }
        Err(e) => {
            eprintln!(
                "{}",
                style(format!("Existing configuration is invalid ({e}). Using defaults.")).yellow()
            );
            Config {
                base_dir: config_path
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default(),
                ..Config::default()
            }
        }
    }
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;

    let protocol = protocols[protocol_index].to_string();

    let host: String = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            let temp_config = OllamaConfig {
                protocol: protocol.clone(),
                host: input.clone(),
                ..OllamaConfig::default()
            };
            temp_config.validate()
        })
        .interact_text()?;

    let port: u16 = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .validate_with(|input: &u16| -> Result<(), &str> {
            if *input == 0 {
                Err("Port must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;

    Ok(())
}

fn configure_models(config: &mut Config) -> Result<()> {
    let backends = &["ollama", "hashing"];
    let default_index = usize::from(config.embedding.backend == EmbeddingBackend::Hashing);

    let backend_index = Select::new()
        .with_prompt("Embedding backend")
        .default(default_index)
        .items(backends)
        .interact()?;

    config.embedding.backend = if backend_index == 0 {
        EmbeddingBackend::Ollama
    } else {
        EmbeddingBackend::Hashing
    };

    if config.embedding.backend == EmbeddingBackend::Ollama {
        config.embedding.model_name = Input::new()
            .with_prompt("Embedding model")
            .default(config.embedding.model_name.clone())
            .validate_with(non_empty)
            .interact_text()?;
    }

    config.generator.model = Input::new()
        .with_prompt("Generation model")
        .default(config.generator.model.clone())
        .validate_with(non_empty)
        .interact_text()?;

    Ok(())
}

fn non_empty(input: &String) -> Result<(), &'static str> {
    if input.trim().is_empty() {
        Err("Model name cannot be empty")
    } else {
        Ok(())
    }
}

fn test_ollama_connection(ollama: &OllamaConfig) -> bool {
    let url = format!(
        "{}://{}:{}/api/version",
        ollama.protocol, ollama.host, ollama.port
    );

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(&url).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
