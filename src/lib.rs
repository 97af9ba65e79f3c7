use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResearchError>;

#[derive(Error, Debug)]
pub enum ResearchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Mistral API Key is missing. Please set it in your `.env` file.")]
    MissingApiKey,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("No vector index found at {0}. Process some article URLs first.")]
    NoIndex(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod crawler;
pub mod database;
pub mod embeddings;
pub mod indexer;
pub mod llm;
pub mod query;
pub mod server;
