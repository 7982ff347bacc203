// Database module
// LanceDB for embedded chunks, SQLite for the quiz mistake log

pub mod lancedb;
pub mod sqlite;

pub use self::lancedb::{
    CollectionManifest, MetadataField, MetadataFilter, ScoredChunk, VectorRecord, VectorStore,
};
pub use self::sqlite::MistakeTracker;
pub use self::sqlite::models::{Mistake, WeakTopic};
