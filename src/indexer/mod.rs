// Indexer module
// Build phase: walk the processed notes, chunk, embed in parallel batches and commit once


use anyhow::Context;
use futures::{StreamExt, TryStreamExt, stream};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::Config;
use crate::database::{VectorRecord, VectorStore};
use crate::embeddings::{
    Chunk, EmbeddingProvider, PathConvention, TextSplitter, chunk_document, embed_blocking,
};
use crate::{Result, StudyError};

/// How a build writes into an existing collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Add the new records next to whatever is already stored
    #[default]
    Append,
    /// Replace the collection's contents in one commit
    Rebuild,
}

/// Outcome of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BuildReport {
    pub documents: usize,
    pub chunks: usize,
    pub records_written: usize,
}

pub struct Indexer {
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    splitter: TextSplitter,
    batch_size: usize,
    parallel_batches: usize,
    show_progress: bool,
}

impl std::fmt::Debug for Indexer {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("store", &self.store)
            .field("embedder", &self.embedder.model_name())
            .field("splitter", &self.splitter)
            .field("batch_size", &self.batch_size)
            .field("parallel_batches", &self.parallel_batches)
            .finish()
    }
}

impl Indexer {
    #[inline]
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        splitter: TextSplitter,
    ) -> Self {
        Self {
            store,
            embedder,
            splitter,
            batch_size: 16,
            parallel_batches: 4,
            show_progress: false,
        }
    }

    /// Indexer configured from the `chunking` and `embedding` sections
    #[inline]
    pub fn from_config(
        config: &Config,
        store: Arc<VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self> {
        let splitter = TextSplitter::from_settings(&config.chunking)?;
        Ok(Self::new(store, embedder, splitter).with_batching(
            config.embedding.batch_size as usize,
            config.embedding.parallel_batches,
        ))
    }

    #[inline]
    #[must_use]
    pub fn with_batching(mut self, batch_size: usize, parallel_batches: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.parallel_batches = parallel_batches.max(1);
        self
    }

    /// Draw a progress bar on an attended terminal while embedding
    #[inline]
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Index every `.txt` file below `root`.
    ///
    /// All chunks are embedded before anything is written, so a provider
    /// failure leaves the collection untouched.
    #[inline]
    pub async fn build(&self, root: &Path, mode: BuildMode) -> Result<BuildReport> {
        let documents = discover_documents(root)?;
        info!(
            "Found {} documents below {}",
            documents.len(),
            root.display()
        );

        let convention = PathConvention::RelativeTo(root.to_path_buf());
        let mut chunks = Vec::new();
        let mut indexed_documents = 0;

        for path in &documents {
            let text = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;

            if text.trim().is_empty() {
                warn!("Skipping empty document {}", path.display());
                continue;
            }

            chunks.extend(chunk_document(&text, path, &self.splitter, &convention));
            indexed_documents += 1;
        }

        if chunks.is_empty() {
            warn!("No chunks produced from {}, nothing written", root.display());
            return Ok(BuildReport {
                documents: indexed_documents,
                ..BuildReport::default()
            });
        }

        let chunk_count = chunks.len();
        let records = self.embed_chunks(chunks).await?;

        let model = self.embedder.model_name();
        let records_written = match mode {
            BuildMode::Append => self.store.upsert(model, records).await?,
            BuildMode::Rebuild => self.store.replace_all(model, records).await?,
        };

        let report = BuildReport {
            documents: indexed_documents,
            chunks: chunk_count,
            records_written,
        };
        info!(
            "Indexed {} documents into {} ({} records)",
            report.documents,
            self.store.collection_name(),
            report.records_written
        );

        Ok(report)
    }

    /// Embed chunks in batches, up to `parallel_batches` at a time, keeping input order
    #[inline]
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<VectorRecord>> {
        let bar = self.progress_bar(chunks.len());
        let batch_size = self.batch_size;

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let batches: Vec<Vec<String>> = texts.chunks(batch_size).map(<[String]>::to_vec).collect();
        debug!(
            "Embedding {} chunks in {} batches",
            chunks.len(),
            batches.len()
        );

        let vectors: Vec<Vec<Vec<f32>>> = stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| {
                let embedder = Arc::clone(&self.embedder);
                async move {
                    embed_blocking(embedder, batch).await.map_err(|e| match e {
                        StudyError::Provider(msg) => StudyError::Provider(format!(
                            "{msg} (build batch starting at chunk {})",
                            index * batch_size
                        )),
                        other => other,
                    })
                }
            })
            .buffered(self.parallel_batches)
            .inspect_ok(|batch| bar.inc(batch.len() as u64))
            .try_collect()
            .await?;

        bar.finish_and_clear();

        let vectors: Vec<Vec<f32>> = vectors.into_iter().flatten().collect();
        if vectors.len() != chunks.len() {
            return Err(StudyError::Provider(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        Ok(chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorRecord::new(chunk, vector))
            .collect())
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress || !console::user_attended_stderr() {
            return ProgressBar::hidden();
        }

        let style = ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding chunks")
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        ProgressBar::new(len as u64).with_style(style)
    }
}

/// Sorted `.txt` files below `root`
#[inline]
pub fn discover_documents(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(StudyError::Config(format!(
            "Processed notes directory {} does not exist",
            root.display()
        )));
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let is_text = entry.path().extension().is_some_and(|ext| ext == "txt");
        if !entry.file_type().is_dir() && is_text {
            documents.push(entry.into_path());
        }
    }

    Ok(documents)
}
