// Process-scoped resources, built once at startup and handed to every command

use std::sync::Arc;
use tracing::debug;

use crate::Result;
use crate::config::Config;
use crate::database::{MistakeTracker, VectorStore};
use crate::embeddings::{EmbeddingProvider, create_provider};
use crate::features::{AnswerGrader, FlashcardGenerator, QuizEngine, Summarizer};
use crate::generation::{QaChain, TextGenerator, create_generator};
use crate::indexer::Indexer;
use crate::retrieval::Retriever;

#[derive(Clone)]
pub struct AppContext {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn TextGenerator>,
    store: Arc<VectorStore>,
}

impl std::fmt::Debug for AppContext {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("config", &self.config)
            .field("embedder", &self.embedder.model_name())
            .field("generator", &self.generator.model_name())
            .field("store", &self.store)
            .finish()
    }
}

impl AppContext {
    /// Build the provider, generator and store named by `config`.
    /// Nothing here contacts Ollama; the first embed or generate call does.
    #[inline]
    pub async fn new(config: Config) -> Result<Self> {
        let embedder = create_provider(&config)?;
        let generator = create_generator(&config)?;
        let store = Arc::new(VectorStore::from_config(&config).await?);

        debug!(
            "Context ready: embedder {}, generator {}, collection {}",
            embedder.model_name(),
            generator.model_name(),
            store.collection_name()
        );

        Ok(Self::with_components(config, embedder, generator, store))
    }

    /// Context around already-built components
    #[inline]
    pub fn with_components(
        config: Config,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn TextGenerator>,
        store: Arc<VectorStore>,
    ) -> Self {
        Self {
            config,
            embedder,
            generator,
            store,
        }
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    #[inline]
    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    #[inline]
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    #[inline]
    pub async fn retriever(&self) -> Result<Retriever> {
        Retriever::new(
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
            self.config.retriever.k,
        )
        .await
    }

    #[inline]
    pub async fn qa_chain(&self) -> Result<QaChain> {
        Ok(QaChain::new(
            self.retriever().await?,
            Arc::clone(&self.generator),
        ))
    }

    #[inline]
    pub fn indexer(&self) -> Result<Indexer> {
        Indexer::from_config(
            &self.config,
            Arc::clone(&self.store),
            Arc::clone(&self.embedder),
        )
    }

    #[inline]
    pub fn summarizer(&self) -> Summarizer {
        Summarizer::new(Arc::clone(&self.store), Arc::clone(&self.generator))
    }

    #[inline]
    pub fn flashcards(&self) -> FlashcardGenerator {
        FlashcardGenerator::new(Arc::clone(&self.store), Arc::clone(&self.generator))
    }

    #[inline]
    pub fn grader(&self) -> Result<AnswerGrader> {
        AnswerGrader::new(
            Arc::clone(&self.embedder),
            self.config.quiz.similarity_threshold,
        )
    }

    #[inline]
    pub async fn mistake_tracker(&self) -> Result<MistakeTracker> {
        MistakeTracker::from_config(&self.config).await
    }

    /// Quiz engine asking `question_count` questions, or the configured number
    #[inline]
    pub async fn quiz_engine(&self, question_count: Option<usize>) -> Result<QuizEngine> {
        QuizEngine::new(
            Arc::clone(&self.store),
            Arc::clone(&self.generator),
            self.grader()?,
            self.mistake_tracker().await?,
            question_count.unwrap_or(self.config.quiz.question_count),
        )
    }
}
