// Embeddings module
// Chunking, the embedding provider seam and its Ollama / hashing adapters

pub mod chunking;
pub mod hashing;
pub mod ollama;

use std::sync::Arc;

use crate::config::{Config, EmbeddingBackend};
use crate::{Result, StudyError};

pub use chunking::{Chunk, ChunkMetadata, PathConvention, TextSplitter, chunk, chunk_document};
pub use hashing::HashingEmbedder;
pub use ollama::{OllamaClient, OllamaEmbedder, OllamaGenerator};

/// Converts text into fixed-dimension vectors.
///
/// Implementations return one vector per input, in input order, and must be
/// deterministic for a given model identifier. Failures surface as
/// `StudyError::Provider`; no vector is ever substituted.
pub trait EmbeddingProvider: Send + Sync {
    /// Identifier recorded next to every collection built with this provider
    fn model_name(&self) -> &str;

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    #[inline]
    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .pop()
            .ok_or_else(|| StudyError::Provider("No embedding returned".to_string()))
    }
}

/// Run a blocking embed call off the async runtime
#[inline]
pub async fn embed_blocking(
    provider: Arc<dyn EmbeddingProvider>,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>> {
    tokio::task::spawn_blocking(move || provider.embed(&texts))
        .await
        .map_err(|e| StudyError::Provider(format!("Embedding task failed: {e}")))?
}

/// Build the provider selected by `embedding.backend`
#[inline]
pub fn create_provider(config: &Config) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.embedding.backend {
        EmbeddingBackend::Ollama => {
            let client = OllamaClient::new(&config.ollama)?;
            Ok(Arc::new(OllamaEmbedder::new(
                client,
                config.embedding.model_name.clone(),
                config.embedding.batch_size as usize,
            )))
        }
        EmbeddingBackend::Hashing => Ok(Arc::new(HashingEmbedder::new(
            config.embedding.dimension as usize,
        )?)),
    }
}

/// Short single-line preview used in provider error messages
#[inline]
pub fn preview(text: &str) -> String {
    const PREVIEW_CHARS: usize = 60;
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > PREVIEW_CHARS {
        let truncated: String = flat.chars().take(PREVIEW_CHARS).collect();
        format!("{truncated}...")
    } else {
        flat
    }
}
