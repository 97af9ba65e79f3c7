pub mod lancedb;

pub use lancedb::{ChunkMetadata, EmbeddingRecord, SearchResult, VectorStore};
