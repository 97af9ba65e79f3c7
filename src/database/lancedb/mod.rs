// Persistent vector index of article chunks


pub mod vector_store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embeddings::{ContentChunk, EmbeddingResult};

pub use vector_store::{SearchResult, VectorStore};

/// One row of the index: a chunk vector plus the chunk it came from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: String,
    /// 384 values for all-minilm
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// Chunk fields stored next to each vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// URL of the article the chunk was cut from
    pub source: String,
    /// Chunk text as handed to the LLM
    pub content: String,
    /// Index of this chunk within its article
    pub chunk_index: u32,
    /// Length of the content in characters
    pub char_count: u32,
    /// RFC 3339 timestamp of when the record was built
    pub created_at: String,
}

impl EmbeddingRecord {
    /// Pair a chunk with its embedding vector
    #[inline]
    pub fn from_chunk(chunk: &ContentChunk, embedding: EmbeddingResult) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            vector: embedding.embedding,
            metadata: ChunkMetadata {
                source: chunk.source.clone(),
                content: chunk.content.clone(),
                chunk_index: u32::try_from(chunk.chunk_index).unwrap_or(u32::MAX),
                char_count: u32::try_from(chunk.char_count).unwrap_or(u32::MAX),
                created_at: Utc::now().to_rfc3339(),
            },
        }
    }
}
