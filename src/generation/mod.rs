// Generation module
// Language-model gateway and the retrieval-augmented question answering chain

#[cfg(test)]
pub(crate) mod scripted;

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::embeddings::{Chunk, OllamaClient, OllamaGenerator};
use crate::retrieval::Retriever;
use crate::{Result, StudyError};

/// Opaque text completion: prompt in, generated text out
pub trait TextGenerator: Send + Sync {
    fn model_name(&self) -> &str;

    fn generate(&self, prompt: &str) -> Result<String>;
}

/// Run a blocking generation call off the async runtime
#[inline]
pub async fn generate_blocking(generator: Arc<dyn TextGenerator>, prompt: String) -> Result<String> {
    tokio::task::spawn_blocking(move || generator.generate(&prompt))
        .await
        .map_err(|e| StudyError::Provider(format!("Generation task failed: {e}")))?
}

/// Generator backed by the configured Ollama model
#[inline]
pub fn create_generator(config: &Config) -> Result<Arc<dyn TextGenerator>> {
    let client = OllamaClient::new(&config.ollama)?;
    Ok(Arc::new(OllamaGenerator::new(client, config.generator.clone())))
}

/// Answer plus the chunks it was grounded on
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QaAnswer {
    pub answer: String,
    pub sources: Vec<Chunk>,
}

/// Build the "stuff" prompt: every retrieved chunk followed by the question
#[inline]
pub fn build_qa_prompt(question: &str, context: &[Chunk]) -> String {
    let context = context
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
         {context}\n\nQuestion: {question}\nHelpful Answer:"
    )
}

/// Retrieval-augmented question answering
#[derive(Clone)]
pub struct QaChain {
    retriever: Retriever,
    generator: Arc<dyn TextGenerator>,
}

impl std::fmt::Debug for QaChain {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaChain")
            .field("retriever", &self.retriever)
            .field("generator", &self.generator.model_name())
            .finish()
    }
}

impl QaChain {
    #[inline]
    pub fn new(retriever: Retriever, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            retriever,
            generator,
        }
    }

    #[inline]
    pub async fn ask(&self, question: &str) -> Result<QaAnswer> {
        let sources = self.retriever.retrieve(question).await?;
        debug!("Answering with {} retrieved chunks", sources.len());

        let prompt = build_qa_prompt(question, &sources);
        let answer = generate_blocking(Arc::clone(&self.generator), prompt).await?;

        info!(
            "Answered question with {} using {} sources",
            self.generator.model_name(),
            sources.len()
        );

        Ok(QaAnswer {
            answer: answer.trim().to_string(),
            sources,
        })
    }
}
