
use std::sync::Arc;
use tracing::{debug, info};

use crate::database::{MetadataFilter, ScoredChunk, VectorStore};
use crate::embeddings::{Chunk, EmbeddingProvider, embed_blocking};
use crate::{Result, StudyError};

/// Top-k similarity retrieval over one collection.
///
/// Uses the same embedding provider the collection was built with; a
/// mismatch is rejected when the retriever is created.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    k: usize,
}

impl std::fmt::Debug for Retriever {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("store", &self.store)
            .field("embedder", &self.embedder.model_name())
            .field("k", &self.k)
            .finish()
    }
}

impl Retriever {
    #[inline]
    pub async fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        k: usize,
    ) -> Result<Self> {
        if k == 0 {
            return Err(StudyError::Config(
                "Retriever k must be at least 1".to_string(),
            ));
        }

        if let Some(manifest) = store.manifest().await? {
            if manifest.embedding_model != embedder.model_name() {
                return Err(StudyError::Config(format!(
                    "Collection '{}' was built with embedding model '{}', but the provider is '{}'",
                    store.collection_name(),
                    manifest.embedding_model,
                    embedder.model_name()
                )));
            }
        }

        info!(
            "Retriever ready over {} (k = {}, model {})",
            store.collection_name(),
            k,
            embedder.model_name()
        );

        Ok(Self { store, embedder, k })
    }

    #[inline]
    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }

    /// The `k` chunks closest to `query`, nearest first
    #[inline]
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Chunk>> {
        Ok(self
            .retrieve_scored(query)
            .await?
            .into_iter()
            .map(|scored| scored.chunk)
            .collect())
    }

    #[inline]
    pub async fn retrieve_scored(&self, query: &str) -> Result<Vec<ScoredChunk>> {
        let embedding = self.embed_query(query).await?;
        let results = self.store.query(&embedding, self.k).await?;
        debug!("Retrieved {} chunks for query", results.len());
        Ok(results)
    }

    /// Like [`Self::retrieve_scored`], restricted to chunks matching `filter`
    #[inline]
    pub async fn retrieve_filtered(
        &self,
        query: &str,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>> {
        let embedding = self.embed_query(query).await?;
        let results = self.store.query_filtered(&embedding, self.k, filter).await?;
        debug!("Retrieved {} filtered chunks for query", results.len());
        Ok(results)
    }

    async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
        embed_blocking(Arc::clone(&self.embedder), vec![query.to_string()])
            .await?
            .pop()
            .ok_or_else(|| StudyError::Provider("No embedding returned for query".to_string()))
    }
}
