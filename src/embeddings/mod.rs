pub mod chunking;
pub mod ollama;

pub use chunking::{
    CHUNK_OVERLAP, CHUNK_SIZE, ChunkingConfig, ContentChunk, split_documents, split_text,
};
pub use ollama::{EmbeddingResult, OllamaClient};
