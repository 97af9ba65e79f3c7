
use super::{ChunkMetadata, EmbeddingRecord};
use crate::{ResearchError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use itertools::Itertools;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const TABLE_NAME: &str = "chunks";

/// On-disk vector index of article chunks backed by LanceDB
pub struct VectorStore {
    connection: Connection,
    path: PathBuf,
    vector_dimension: usize,
}

/// Search result from vector similarity search
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub chunk_metadata: ChunkMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Build a fresh index at `path` holding exactly `records`.
    ///
    /// Any table already present at `path` is dropped first.
    #[inline]
    pub async fn create(path: &Path, records: Vec<EmbeddingRecord>) -> Result<Self> {
        let vector_dimension = records.first().map(|r| r.vector.len()).ok_or_else(|| {
            ResearchError::Database("Cannot build an index without any chunks".to_string())
        })?;

        if vector_dimension == 0 {
            return Err(ResearchError::Database(
                "Embedding vectors must not be empty".to_string(),
            ));
        }

        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dimension) {
            return Err(ResearchError::Database(format!(
                "Record {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                vector_dimension
            )));
        }

        std::fs::create_dir_all(path).map_err(|e| {
            ResearchError::Database(format!(
                "Failed to create vector index directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let connection = Self::connect(path).await?;
        let store = Self {
            connection,
            path: path.to_path_buf(),
            vector_dimension,
        };

        store.drop_table_if_exists().await?;

        let table = store
            .connection
            .create_empty_table(TABLE_NAME, chunk_schema(vector_dimension))
            .execute()
            .await
            .map_err(|e| ResearchError::Database(format!("Failed to create table: {}", e)))?;

        let record_batch = store.create_record_batch(&records)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| ResearchError::Database(format!("Failed to insert embeddings: {}", e)))?;

        info!(
            "Stored {} embeddings ({} dimensions) at {}",
            records.len(),
            vector_dimension,
            path.display()
        );
        Ok(store)
    }

    /// Open an existing index, failing with [`ResearchError::NoIndex`] when none was saved
    #[inline]
    pub async fn open(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Err(ResearchError::NoIndex(path.display().to_string()));
        }

        let connection = Self::connect(path).await?;

        let table_names = connection
            .table_names()
            .execute()
            .await
            .map_err(|e| ResearchError::Database(format!("Failed to list tables: {}", e)))?;

        if !table_names.iter().any(|name| name == TABLE_NAME) {
            return Err(ResearchError::NoIndex(path.display().to_string()));
        }

        let table = connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| ResearchError::Database(format!("Failed to open table: {}", e)))?;

        let vector_dimension = detect_vector_dimension(&table).await?;
        debug!(
            "Opened vector index at {} ({} dimensions)",
            path.display(),
            vector_dimension
        );

        Ok(Self {
            connection,
            path: path.to_path_buf(),
            vector_dimension,
        })
    }

    async fn connect(path: &Path) -> Result<Connection> {
        // A relative `file://` URI would read its first component as a host
        let path = std::path::absolute(path)?;
        let uri = path.to_string_lossy();
        lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| ResearchError::Database(format!("Failed to connect to LanceDB: {}", e)))
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    pub fn vector_dimension(&self) -> usize {
        self.vector_dimension
    }

    async fn open_table(&self) -> Result<Table> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| ResearchError::Database(format!("Failed to open table: {}", e)))
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        let table_names =
            self.connection.table_names().execute().await.map_err(|e| {
                ResearchError::Database(format!("Failed to list tables for drop: {}", e))
            })?;

        if table_names.iter().any(|name| name == TABLE_NAME) {
            info!("Dropping existing chunks table at {}", self.path.display());
            self.connection
                .drop_table(TABLE_NAME)
                .await
                .map_err(|e| ResearchError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }

    /// Create a RecordBatch from embedding records
    fn create_record_batch(&self, records: &[EmbeddingRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let vector_dim = self.vector_dimension;

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut sources = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut char_counts = Vec::with_capacity(len);
        let mut created_ats = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            sources.push(record.metadata.source.as_str());
            contents.push(record.metadata.content.as_str());
            chunk_indices.push(record.metadata.chunk_index);
            char_counts.push(record.metadata.char_count);
            created_ats.push(record.metadata.created_at.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| {
                    ResearchError::Database(format!("Failed to create vector array: {}", e))
                })?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(contents)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(UInt32Array::from(char_counts)),
            Arc::new(StringArray::from(created_ats)),
        ];

        RecordBatch::try_new(chunk_schema(vector_dim), arrays)
            .map_err(|e| ResearchError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Return the `limit` chunks nearest to `query_vector`, closest first
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchResult>> {
        if query_vector.len() != self.vector_dimension {
            return Err(ResearchError::Database(format!(
                "Query vector has {} dimensions but the index stores {}",
                query_vector.len(),
                self.vector_dimension
            )));
        }

        if limit == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self.open_table().await?;
        let results = table
            .vector_search(query_vector)
            .map_err(|e| {
                ResearchError::Database(format!("Failed to create vector search: {}", e))
            })?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| ResearchError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = parse_results_stream(results).await?;
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(search_results)
    }

    /// Every stored chunk without its vector, ordered by source then chunk index
    #[inline]
    pub async fn list_chunks(&self) -> Result<Vec<ChunkMetadata>> {
        let total = self.count_embeddings().await?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let table = self.open_table().await?;
        let results = table
            .query()
            .limit(total as usize)
            .execute()
            .await
            .map_err(|e| ResearchError::Database(format!("Failed to scan table: {}", e)))?;

        let mut chunks: Vec<ChunkMetadata> = parse_results_stream(results)
            .await?
            .into_iter()
            .map(|result| result.chunk_metadata)
            .collect();
        chunks.sort_by(|a, b| {
            a.source
                .cmp(&b.source)
                .then(a.chunk_index.cmp(&b.chunk_index))
        });
        Ok(chunks)
    }

    /// Distinct article URLs present in the index, sorted
    #[inline]
    pub async fn sources(&self) -> Result<Vec<String>> {
        let chunks = self.list_chunks().await?;
        Ok(chunks.into_iter().map(|c| c.source).unique().collect())
    }

    /// Get the total number of embeddings stored
    #[inline]
    pub async fn count_embeddings(&self) -> Result<u64> {
        let table = self.open_table().await?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| ResearchError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }

    /// Move a fully written index from `staging` into place at `target`.
    ///
    /// The previous index is kept aside until the new one is in place and is
    /// restored if the final rename fails.
    #[inline]
    pub fn replace_index(staging: &Path, target: &Path) -> Result<()> {
        if !staging.is_dir() {
            return Err(ResearchError::Database(format!(
                "Staged index {} does not exist",
                staging.display()
            )));
        }

        let backup = sibling_path(target, "previous");
        if backup.exists() {
            std::fs::remove_dir_all(&backup)?;
        }

        let had_previous = target.exists();
        if had_previous {
            std::fs::rename(target, &backup)?;
        }

        if let Err(e) = std::fs::rename(staging, target) {
            if had_previous {
                if let Err(restore_err) = std::fs::rename(&backup, target) {
                    warn!(
                        "Failed to restore previous index from {}: {}",
                        backup.display(),
                        restore_err
                    );
                }
            }
            return Err(ResearchError::Database(format!(
                "Failed to move new index into {}: {}",
                target.display(),
                e
            )));
        }

        if had_previous {
            if let Err(e) = std::fs::remove_dir_all(&backup) {
                warn!(
                    "Failed to remove previous index at {}: {}",
                    backup.display(),
                    e
                );
            }
        }

        info!("Vector index replaced at {}", target.display());
        Ok(())
    }
}

/// Directory next to `path` with `suffix` appended to its name
#[inline]
pub fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "vector_index".into(), |n| n.to_string_lossy());
    path.with_file_name(format!("{}.{}", name, suffix))
}

fn chunk_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("source", DataType::Utf8, false),
        Field::new("content", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("char_count", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

async fn detect_vector_dimension(table: &Table) -> Result<usize> {
    let schema = table
        .schema()
        .await
        .map_err(|e| ResearchError::Database(format!("Failed to get table schema: {}", e)))?;

    for field in schema.fields() {
        if field.name() == "vector" {
            if let DataType::FixedSizeList(_, size) = field.data_type() {
                return Ok(*size as usize);
            }
        }
    }

    Err(ResearchError::Database(
        "Could not find vector column or determine dimension".to_string(),
    ))
}

async fn parse_results_stream(
    mut results: lancedb::arrow::SendableRecordBatchStream,
) -> Result<Vec<SearchResult>> {
    let mut search_results = Vec::new();

    while let Some(batch) = results
        .try_next()
        .await
        .map_err(|e| ResearchError::Database(format!("Failed to read result stream: {}", e)))?
    {
        search_results.extend(parse_batch(&batch)?);
    }

    debug!("Parsed {} results from stream", search_results.len());
    Ok(search_results)
}

fn typed_column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| ResearchError::Database(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| ResearchError::Database(format!("Invalid {} column type", name)))
}

fn parse_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let sources = typed_column::<StringArray>(batch, "source")?;
    let contents = typed_column::<StringArray>(batch, "content")?;
    let chunk_indices = typed_column::<UInt32Array>(batch, "chunk_index")?;
    let char_counts = typed_column::<UInt32Array>(batch, "char_count")?;
    let created_ats = typed_column::<StringArray>(batch, "created_at")?;

    // Only present on vector searches
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let results = (0..batch.num_rows())
        .map(|row| {
            let distance = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            SearchResult {
                chunk_metadata: ChunkMetadata {
                    source: sources.value(row).to_string(),
                    content: contents.value(row).to_string(),
                    chunk_index: chunk_indices.value(row),
                    char_count: char_counts.value(row),
                    created_at: created_ats.value(row).to_string(),
                },
                similarity_score: 1.0 - distance,
                distance,
            }
        })
        .collect();

    Ok(results)
}
