
use super::{CollectionManifest, MetadataFilter, ScoredChunk, VectorRecord};
use crate::config::Config;
use crate::embeddings::chunking::{Chunk, ChunkMetadata};
use crate::{Result, StudyError};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::table::AddDataMode;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A named, persistent collection of embedded chunks.
///
/// Writes are serialised through an internal lock; every write commits a single
/// table version, so concurrent readers only ever see complete builds.
pub struct VectorStore {
    connection: Connection,
    persist_directory: PathBuf,
    collection_name: String,
    write_lock: Mutex<()>,
}

impl std::fmt::Debug for VectorStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("persist_directory", &self.persist_directory)
            .field("collection_name", &self.collection_name)
            .finish_non_exhaustive()
    }
}

fn store_error(context: &str) -> impl FnOnce(lancedb::Error) -> StudyError + '_ {
    move |e| StudyError::Store(format!("{context}: {e}"))
}

impl VectorStore {
    /// Open the collection configured in `database`
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        Self::open(config.persist_directory(), &config.database.collection_name).await
    }

    /// Open (or lazily create) `collection_name` under `persist_directory`
    #[inline]
    pub async fn open(persist_directory: impl AsRef<Path>, collection_name: &str) -> Result<Self> {
        crate::config::settings::validate_collection_name(collection_name)?;

        let persist_directory = persist_directory.as_ref().to_path_buf();
        debug!("Initializing LanceDB at path: {:?}", persist_directory);

        tokio::fs::create_dir_all(&persist_directory)
            .await
            .map_err(|e| {
                StudyError::Store(format!(
                    "Failed to create vector store directory {}: {}",
                    persist_directory.display(),
                    e
                ))
            })?;

        let uri = format!("file://{}", persist_directory.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(store_error("Failed to connect to LanceDB"))?;

        info!(
            "Vector store opened at {} (collection {})",
            persist_directory.display(),
            collection_name
        );

        Ok(Self {
            connection,
            persist_directory,
            collection_name: collection_name.to_string(),
            write_lock: Mutex::new(()),
        })
    }

    #[inline]
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    #[inline]
    pub fn persist_directory(&self) -> &Path {
        &self.persist_directory
    }

    fn manifest_path(&self) -> PathBuf {
        self.persist_directory
            .join(format!("{}.manifest.json", self.collection_name))
    }

    /// Embedding model and dimension recorded for this collection, if it was ever written
    #[inline]
    pub async fn manifest(&self) -> Result<Option<CollectionManifest>> {
        let path = self.manifest_path();
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StudyError::Store(format!(
                    "Failed to read collection manifest {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            StudyError::Store(format!(
                "Corrupt collection manifest {}: {}",
                path.display(),
                e
            ))
        })
    }

    async fn write_manifest(&self, manifest: &CollectionManifest) -> Result<()> {
        let path = self.manifest_path();
        let temp_path = path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(manifest)
            .map_err(|e| StudyError::Store(format!("Failed to serialize manifest: {e}")))?;

        tokio::fs::write(&temp_path, content).await?;
        tokio::fs::rename(&temp_path, &path).await?;

        debug!("Wrote collection manifest {}", path.display());
        Ok(())
    }

    async fn open_table(&self) -> Result<Option<Table>> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(store_error("Failed to list tables"))?;

        if !table_names.contains(&self.collection_name) {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(&self.collection_name)
            .execute()
            .await
            .map_err(store_error("Failed to open table"))?;

        Ok(Some(table))
    }

    async fn create_table(&self, dimension: usize) -> Result<Table> {
        info!(
            "Creating collection {} with {} dimensions",
            self.collection_name, dimension
        );

        self.connection
            .create_empty_table(&self.collection_name, create_schema(dimension)?)
            .execute()
            .await
            .map_err(store_error("Failed to create table"))
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        if self.open_table().await?.is_some() {
            info!("Dropping collection {}", self.collection_name);
            self.connection
                .drop_table(&self.collection_name)
                .await
                .map_err(store_error("Failed to drop table"))?;
        }
        Ok(())
    }

    /// Append records. Repeated calls append duplicates.
    ///
    /// Fails with a configuration error when the collection was built with another
    /// embedding model, and with a store error on a dimension mismatch.
    #[inline]
    pub async fn upsert(&self, embedding_model: &str, records: Vec<VectorRecord>) -> Result<usize> {
        let Some(dimension) = uniform_dimension(&records)? else {
            debug!("No records to store");
            return Ok(0);
        };

        let _guard = self.write_lock.lock().await;

        let manifest = self.manifest().await?;
        if let Some(manifest) = &manifest {
            check_manifest(manifest, embedding_model, dimension)?;
        }

        let existing_table = self.open_table().await?;
        if let Some(table) = &existing_table {
            let existing = table_dimension(table).await?;
            if existing != dimension {
                return Err(StudyError::Store(format!(
                    "Collection {} stores {}-dimensional vectors, got {}",
                    self.collection_name, existing, dimension
                )));
            }
        }

        // The manifest goes first so stored rows are never left without one
        if manifest.is_none() {
            self.write_manifest(&new_manifest(embedding_model, dimension))
                .await?;
        }

        let table = match existing_table {
            Some(table) => table,
            None => self.create_table(dimension).await?,
        };

        let first_sequence = table
            .count_rows(None)
            .await
            .map_err(store_error("Failed to count rows"))? as u64;

        let written = records.len();
        let batch = create_record_batch(&records, dimension, first_sequence)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(store_error("Failed to insert records"))?;

        info!(
            "Stored {} records in {}",
            written, self.collection_name
        );
        Ok(written)
    }

    /// Replace the whole collection with `records` in one overwrite commit
    #[inline]
    pub async fn replace_all(
        &self,
        embedding_model: &str,
        records: Vec<VectorRecord>,
    ) -> Result<usize> {
        let Some(dimension) = uniform_dimension(&records)? else {
            warn!(
                "Rebuilding {} with no records clears the collection",
                self.collection_name
            );
            self.drop_collection().await?;
            return Ok(0);
        };

        let _guard = self.write_lock.lock().await;

        let existing = match self.open_table().await? {
            Some(table) => {
                let existing_dimension = table_dimension(&table).await?;
                Some((table, existing_dimension))
            }
            None => None,
        };

        let table = match existing {
            Some((table, existing_dimension)) if existing_dimension == dimension => table,
            Some(_) => {
                warn!(
                    "Dimension of {} changes to {}, recreating the table",
                    self.collection_name, dimension
                );
                self.drop_table_if_exists().await?;
                self.create_table(dimension).await?
            }
            None => self.create_table(dimension).await?,
        };

        let written = records.len();
        let batch = create_record_batch(&records, dimension, 0)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);
        table
            .add(reader)
            .mode(AddDataMode::Overwrite)
            .execute()
            .await
            .map_err(store_error("Failed to overwrite collection"))?;

        self.write_manifest(&new_manifest(embedding_model, dimension))
            .await?;

        info!(
            "Rebuilt {} with {} records",
            self.collection_name, written
        );
        Ok(written)
    }

    /// The `k` nearest chunks by cosine distance, ascending; ties keep insertion order,
    /// including which tied chunks make the cut at `k`
    #[inline]
    pub async fn query(&self, embedding: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.nearest(embedding, k, None).await
    }

    /// Nearest-neighbour search restricted to chunks matching `filter`
    #[inline]
    pub async fn query_filtered(
        &self,
        embedding: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<ScoredChunk>> {
        self.nearest(embedding, k, filter.to_predicate()).await
    }

    async fn nearest(
        &self,
        embedding: &[f32],
        k: usize,
        predicate: Option<String>,
    ) -> Result<Vec<ScoredChunk>> {
        debug!("Searching for {} nearest vectors", k);

        if k == 0 {
            return Ok(Vec::new());
        }
        let Some(table) = self.open_table().await? else {
            return Ok(Vec::new());
        };

        let dimension = table_dimension(&table).await?;
        if embedding.len() != dimension {
            return Err(StudyError::Store(format!(
                "Query vector has {} dimensions, collection {} stores {}",
                embedding.len(),
                self.collection_name,
                dimension
            )));
        }

        // Widen the fetch until every row tied with the k-th one is in hand
        let mut limit = k.saturating_add(1);
        let mut results = loop {
            let rows = search_rows(&table, embedding, limit, predicate.as_deref()).await?;
            if rows.len() < limit {
                break rows;
            }
            let boundary = rows.get(k - 1).map(|row| row.distance);
            let last = rows.last().map(|row| row.distance);
            if boundary.zip(last).is_some_and(|(boundary, last)| last > boundary) {
                break rows;
            }
            debug!("Distance tie at the cut-off, widening search beyond {}", limit);
            limit = limit.saturating_mul(2);
        };
        results.truncate(k);

        debug!("Found {} neighbours", results.len());
        Ok(results)
    }

    /// All chunks matching `filter`, in insertion order, ignoring similarity
    #[inline]
    pub async fn filter(&self, filter: &MetadataFilter) -> Result<Vec<Chunk>> {
        let Some(table) = self.open_table().await? else {
            return Ok(Vec::new());
        };

        let predicate = filter.to_predicate();
        let total = table
            .count_rows(predicate.clone())
            .await
            .map_err(store_error("Failed to count matching rows"))?;

        if total == 0 {
            return Ok(Vec::new());
        }

        let mut query = table.query().limit(total);
        if let Some(predicate) = predicate {
            query = query.only_if(predicate);
        }

        let stream = query
            .execute()
            .await
            .map_err(store_error("Failed to execute filter"))?;

        let mut rows = collect_rows(stream).await?;
        rows.sort_by_key(|row| row.sequence);

        debug!("Filter matched {} chunks", rows.len());
        Ok(rows.into_iter().map(|row| row.chunk).collect())
    }

    #[inline]
    pub async fn count(&self) -> Result<usize> {
        match self.open_table().await? {
            Some(table) => table
                .count_rows(None)
                .await
                .map_err(store_error("Failed to count rows")),
            None => Ok(0),
        }
    }

    /// Remove the collection and its manifest
    #[inline]
    pub async fn drop_collection(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        self.drop_table_if_exists().await?;

        match tokio::fs::remove_file(self.manifest_path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        info!("Dropped collection {}", self.collection_name);
        Ok(())
    }
}

/// Up to `limit` nearest rows, sorted by distance then insertion order
async fn search_rows(
    table: &Table,
    embedding: &[f32],
    limit: usize,
    predicate: Option<&str>,
) -> Result<Vec<ScoredChunk>> {
    let mut query = table
        .vector_search(embedding)
        .map_err(store_error("Failed to create vector search"))?
        .column("vector")
        .distance_type(DistanceType::Cosine)
        .limit(limit);

    if let Some(predicate) = predicate {
        query = query.only_if(predicate);
    }

    let stream = query
        .execute()
        .await
        .map_err(store_error("Failed to execute search"))?;

    let mut rows = collect_rows(stream).await?;
    rows.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.sequence.cmp(&b.sequence))
    });
    Ok(rows)
}

fn new_manifest(embedding_model: &str, dimension: usize) -> CollectionManifest {
    CollectionManifest {
        embedding_model: embedding_model.to_string(),
        dimension,
        created_at: Utc::now(),
    }
}

fn check_manifest(
    manifest: &CollectionManifest,
    embedding_model: &str,
    dimension: usize,
) -> Result<()> {
    if manifest.embedding_model != embedding_model {
        return Err(StudyError::Config(format!(
            "Collection was built with embedding model '{}', but '{}' is configured; rebuild the index to switch models",
            manifest.embedding_model, embedding_model
        )));
    }
    if manifest.dimension != dimension {
        return Err(StudyError::Store(format!(
            "Collection stores {}-dimensional vectors, got {}",
            manifest.dimension, dimension
        )));
    }
    Ok(())
}

fn uniform_dimension(records: &[VectorRecord]) -> Result<Option<usize>> {
    let Some(first) = records.first() else {
        return Ok(None);
    };
    let dimension = first.vector.len();

    if dimension == 0 {
        return Err(StudyError::Store("Cannot store empty vectors".to_string()));
    }
    if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
        return Err(StudyError::Store(format!(
            "Record from {} has {} dimensions, expected {}",
            bad.chunk.metadata.source,
            bad.vector.len(),
            dimension
        )));
    }

    Ok(Some(dimension))
}

fn list_size(dimension: usize) -> Result<i32> {
    i32::try_from(dimension)
        .map_err(|_| StudyError::Store(format!("Vector dimension {dimension} is too large")))
}

fn create_schema(dimension: usize) -> Result<Arc<Schema>> {
    Ok(Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, true)),
                list_size(dimension)?,
            ),
            false,
        ),
        Field::new("text", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("specialization", DataType::Utf8, true),
        Field::new("course", DataType::Utf8, true),
        Field::new("notes_type", DataType::Utf8, true),
        Field::new("seq", DataType::UInt64, false),
    ])))
}

async fn table_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(store_error("Failed to get table schema"))?;

    let field = schema
        .field_with_name("vector")
        .map_err(|e| StudyError::Store(format!("Missing vector column: {e}")))?;

    match field.data_type() {
        DataType::FixedSizeList(_, size) => usize::try_from(*size)
            .map_err(|_| StudyError::Store(format!("Invalid vector dimension {size}"))),
        other => Err(StudyError::Store(format!(
            "Unexpected vector column type {other}"
        ))),
    }
}

fn create_record_batch(
    records: &[VectorRecord],
    dimension: usize,
    first_sequence: u64,
) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * dimension);
    let mut texts = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut specializations = Vec::with_capacity(len);
    let mut courses = Vec::with_capacity(len);
    let mut notes_types = Vec::with_capacity(len);
    let mut sequences = Vec::with_capacity(len);

    for (offset, record) in (0_u64..).zip(records) {
        let metadata = &record.chunk.metadata;
        ids.push(record.id.as_str());
        flat_values.extend_from_slice(&record.vector);
        texts.push(record.chunk.text.as_str());
        sources.push(metadata.source.as_str());
        specializations.push(metadata.specialization.as_deref());
        courses.push(metadata.course.as_deref());
        notes_types.push(metadata.notes_type.as_deref());
        sequences.push(first_sequence + offset);
    }

    let field = Arc::new(Field::new("item", DataType::Float32, true));
    let vector_array = FixedSizeListArray::try_new(
        field,
        list_size(dimension)?,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| StudyError::Store(format!("Failed to create vector array: {e}")))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(texts)),
        Arc::new(StringArray::from(sources)),
        Arc::new(StringArray::from(specializations)),
        Arc::new(StringArray::from(courses)),
        Arc::new(StringArray::from(notes_types)),
        Arc::new(UInt64Array::from(sequences)),
    ];

    RecordBatch::try_new(create_schema(dimension)?, arrays)
        .map_err(|e| StudyError::Store(format!("Failed to create record batch: {e}")))
}

async fn collect_rows(
    mut stream: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<ScoredChunk>> {
    let mut rows = Vec::new();

    while let Some(batch) = stream
        .try_next()
        .await
        .map_err(store_error("Failed to read result stream"))?
    {
        rows.extend(parse_batch(&batch)?);
    }

    Ok(rows)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| StudyError::Store(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| StudyError::Store(format!("Invalid {name} column type")))
}

fn optional_value(column: &StringArray, row: usize) -> Option<String> {
    (!column.is_null(row)).then(|| column.value(row).to_string())
}

fn parse_batch(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
    let texts = string_column(batch, "text")?;
    let sources = string_column(batch, "source")?;
    let specializations = string_column(batch, "specialization")?;
    let courses = string_column(batch, "course")?;
    let notes_types = string_column(batch, "notes_type")?;

    let sequences = batch
        .column_by_name("seq")
        .ok_or_else(|| StudyError::Store("Missing seq column".to_string()))?
        .as_any()
        .downcast_ref::<UInt64Array>()
        .ok_or_else(|| StudyError::Store("Invalid seq column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let rows = (0..batch.num_rows())
        .map(|row| ScoredChunk {
            chunk: Chunk {
                text: texts.value(row).to_string(),
                metadata: ChunkMetadata {
                    source: sources.value(row).to_string(),
                    specialization: optional_value(specializations, row),
                    course: optional_value(courses, row),
                    notes_type: optional_value(notes_types, row),
                },
            },
            distance: distances.map_or(0.0, |d| d.value(row)),
            sequence: sequences.value(row),
        })
        .collect();

    Ok(rows)
}
