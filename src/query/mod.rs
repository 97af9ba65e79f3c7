// Query pipeline: embed the question, retrieve nearby chunks, ask the LLM

#[cfg(test)]
mod tests;

use itertools::Itertools;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::{ApiKey, Config};
use crate::database::lancedb::{SearchResult, VectorStore};
use crate::embeddings::ollama::OllamaClient;
use crate::llm::{MistralClient, build_messages, parse_answer};
use crate::{ResearchError, Result};

pub use crate::llm::Answer;

/// Answers questions against the persisted vector index
#[derive(Debug, Clone)]
pub struct QueryEngine {
    index_path: PathBuf,
    ollama_client: OllamaClient,
    llm_client: MistralClient,
    top_k: usize,
}

impl QueryEngine {
    #[inline]
    pub fn new(config: &Config, api_key: ApiKey) -> Result<Self> {
        let ollama_client = OllamaClient::new(config)
            .map_err(|e| ResearchError::Embedding(format!("{:#}", e)))?;
        let llm_client = MistralClient::new(&config.llm, api_key)
            .map_err(|e| ResearchError::Config(format!("{:#}", e)))?;

        Ok(Self {
            index_path: config.vector_index_path(),
            ollama_client,
            llm_client,
            top_k: config.retrieval.top_k,
        })
    }

    #[inline]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// The `top_k` stored chunks closest to `question`
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<SearchResult>> {
        let question = validate_question(question)?;
        let store = VectorStore::open(&self.index_path).await?;

        let ollama_client = self.ollama_client.clone();
        let owned_question = question.to_string();
        let embedding =
            tokio::task::spawn_blocking(move || ollama_client.generate_embedding(&owned_question))
                .await
                .map_err(|e| {
                    ResearchError::Other(anyhow::anyhow!("Embedding task failed: {}", e))
                })?
                .map_err(|e| ResearchError::Embedding(format!("{:#}", e)))?;

        let results = store
            .search_similar(&embedding.embedding, self.top_k)
            .await?;
        debug!(
            "Retrieved {} chunks for question '{}'",
            results.len(),
            question
        );
        Ok(results)
    }

    /// Answer `question` from the indexed articles, citing their URLs
    #[inline]
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        let results = self.retrieve(question).await?;

        if results.is_empty() {
            return Err(ResearchError::Database(
                "The vector index returned no passages".to_string(),
            ));
        }

        let chunks: Vec<_> = results.into_iter().map(|r| r.chunk_metadata).collect();
        let retrieved_sources: Vec<String> =
            chunks.iter().map(|c| c.source.clone()).unique().collect();
        let messages = build_messages(question, &chunks);

        let llm_client = self.llm_client.clone();
        let completion = tokio::task::spawn_blocking(move || llm_client.chat(&messages))
            .await
            .map_err(|e| ResearchError::Other(anyhow::anyhow!("LLM task failed: {}", e)))?
            .map_err(|e| ResearchError::Llm(format!("{:#}", e)))?;

        let answer = parse_answer(&completion, &retrieved_sources)
            .map_err(|e| ResearchError::Llm(format!("{:#}", e)))?;

        info!(
            "Answered with {} sources from {} retrieved chunks",
            answer.sources.len(),
            chunks.len()
        );
        Ok(answer)
    }
}

fn validate_question(question: &str) -> Result<&str> {
    let question = question.trim();
    if question.is_empty() {
        return Err(ResearchError::InvalidInput(
            "Enter a question to ask about the articles".to_string(),
        ));
    }
    Ok(question)
}
