// LanceDB vector database module
// Persistent collections of embedded chunks with similarity search and metadata filters


pub mod vector_store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::embeddings::chunking::{Chunk, ChunkMetadata};

pub use vector_store::VectorStore;

/// A chunk plus its embedding, as written to a collection
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub chunk: Chunk,
}

impl VectorRecord {
    #[inline]
    pub fn new(chunk: Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            chunk,
        }
    }
}

/// A neighbour search hit
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    /// Cosine distance to the query vector (lower is closer)
    pub distance: f32,
    /// Insertion order within the collection
    pub sequence: u64,
}

/// Recorded next to each collection so a mismatched provider is caught before it writes or reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionManifest {
    pub embedding_model: String,
    pub dimension: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataField {
    Source,
    Specialization,
    Course,
    NotesType,
}

impl MetadataField {
    #[inline]
    pub fn column(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Specialization => "specialization",
            Self::Course => "course",
            Self::NotesType => "notes_type",
        }
    }

    #[inline]
    pub fn value_of(self, metadata: &ChunkMetadata) -> Option<&str> {
        match self {
            Self::Source => Some(metadata.source.as_str()),
            Self::Specialization => metadata.specialization.as_deref(),
            Self::Course => metadata.course.as_deref(),
            Self::NotesType => metadata.notes_type.as_deref(),
        }
    }
}

/// Conjunction of exact-match conditions on chunk metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataFilter {
    conditions: Vec<(MetadataField, String)>,
}

impl MetadataFilter {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn course(value: impl Into<String>) -> Self {
        Self::new().with(MetadataField::Course, value)
    }

    #[inline]
    #[must_use]
    pub fn with(mut self, field: MetadataField, value: impl Into<String>) -> Self {
        self.conditions.push((field, value.into()));
        self
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    #[inline]
    pub fn conditions(&self) -> &[(MetadataField, String)] {
        &self.conditions
    }

    /// SQL predicate understood by LanceDB, or `None` when unconstrained
    #[inline]
    pub fn to_predicate(&self) -> Option<String> {
        if self.conditions.is_empty() {
            return None;
        }

        let clauses: Vec<String> = self
            .conditions
            .iter()
            .map(|(field, value)| format!("{} = '{}'", field.column(), value.replace('\'', "''")))
            .collect();

        Some(clauses.join(" AND "))
    }

    #[inline]
    pub fn matches(&self, metadata: &ChunkMetadata) -> bool {
        self.conditions
            .iter()
            .all(|(field, value)| field.value_of(metadata) == Some(value.as_str()))
    }
}

/// Topic label used in prompts and the mistake log, e.g. `DL/RNNs`
impl std::fmt::Display for MetadataFilter {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.conditions.is_empty() {
            return f.write_str("all notes");
        }
        let values: Vec<&str> = self.conditions.iter().map(|(_, v)| v.as_str()).collect();
        f.write_str(&values.join("/"))
    }
}
