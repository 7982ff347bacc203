use std::sync::Arc;
use tempfile::TempDir;

use crate::database::{VectorRecord, VectorStore};
use crate::Result;
use crate::embeddings::{Chunk, ChunkMetadata, EmbeddingProvider, HashingEmbedder};

/// Returns one vector per input, each a dimension longer than the last
pub(crate) struct MismatchedEmbedder;

impl EmbeddingProvider for MismatchedEmbedder {
    fn model_name(&self) -> &str {
        "mismatched"
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok((0..texts.len()).map(|i| vec![1.0; i + 2]).collect())
    }
}

/// Store holding one record per `(course, text)` passage, embedded with the hashing provider
pub(crate) async fn notes_store(
    passages: &[(&str, &str)],
) -> (Arc<VectorStore>, Arc<dyn EmbeddingProvider>, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let store = VectorStore::open(temp_dir.path(), "study_notes")
        .await
        .expect("should open store");
    let embedder: Arc<dyn EmbeddingProvider> =
        Arc::new(HashingEmbedder::new(128).expect("valid dimension"));

    let texts: Vec<String> = passages.iter().map(|(_, t)| (*t).to_string()).collect();
    let vectors = embedder.embed(&texts).expect("hashing never fails");
    let records = passages
        .iter()
        .zip(vectors)
        .map(|((course, text), vector)| {
            let chunk = Chunk {
                text: (*text).to_string(),
                metadata: ChunkMetadata {
                    specialization: Some("DL".to_string()),
                    course: Some((*course).to_string()),
                    notes_type: Some("Lectures".to_string()),
                    ..ChunkMetadata::from_source(format!("DL/{course}/Lectures.txt"))
                },
            };
            VectorRecord::new(chunk, vector)
        })
        .collect();

    store
        .upsert(embedder.model_name(), records)
        .await
        .expect("should store records");

    (Arc::new(store), embedder, temp_dir)
}
