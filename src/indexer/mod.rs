// Ingestion pipeline: fetch articles, split, embed, and persist a fresh index


use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::crawler::{self, CrawlerConfig, Document, HttpClient};
use crate::database::lancedb::vector_store::sibling_path;
use crate::database::lancedb::{EmbeddingRecord, VectorStore};
use crate::embeddings::chunking::{ChunkingConfig, split_documents};
use crate::embeddings::ollama::OllamaClient;
use crate::{ResearchError, Result};

/// Step of an ingestion run, reported as it starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStage {
    Loading,
    Splitting,
    Embedding,
    Saving,
    Complete,
}

impl IngestStage {
    /// Status line shown to the user
    #[inline]
    pub fn message(self) -> &'static str {
        match self {
            Self::Loading => "📥 Loading articles...",
            Self::Splitting => "✂️ Splitting text into chunks...",
            Self::Embedding => "🔎 Generating embeddings...",
            Self::Saving => "💾 Saving vector index...",
            Self::Complete => "✅ Processing complete!",
        }
    }
}

impl fmt::Display for IngestStage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Summary of a successful ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub sources: Vec<String>,
    pub documents: usize,
    pub chunks: usize,
    pub index_path: PathBuf,
    pub elapsed: Duration,
}

type StageObserver = Arc<dyn Fn(IngestStage) + Send + Sync>;

/// Builds the vector index from a handful of article URLs
#[derive(Debug, Clone)]
pub struct Indexer {
    index_path: PathBuf,
    http_client: HttpClient,
    ollama_client: OllamaClient,
    chunking_config: ChunkingConfig,
}

impl Indexer {
    /// Create an indexer writing to the configured index location
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let ollama_client = OllamaClient::new(config)
            .map_err(|e| ResearchError::Embedding(format!("{:#}", e)))?;

        Ok(Self {
            index_path: config.vector_index_path(),
            http_client: HttpClient::new(&CrawlerConfig::default()),
            ollama_client,
            chunking_config: ChunkingConfig::default(),
        })
    }

    /// Fetch articles with `http_client` instead of the default one
    #[inline]
    pub fn with_http_client(mut self, http_client: HttpClient) -> Self {
        self.http_client = http_client;
        self
    }

    #[inline]
    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Replace the index with one built from `urls`.
    ///
    /// Nothing on disk changes unless every URL was fetched, split and
    /// embedded and the new index was fully written.
    #[inline]
    pub async fn ingest<S, F>(&self, urls: &[S], observer: F) -> Result<IngestReport>
    where
        S: AsRef<str>,
        F: Fn(IngestStage) + Send + Sync + 'static,
    {
        let started = Instant::now();
        let observer: StageObserver = Arc::new(observer);

        let urls = crawler::prepare_urls(urls)
            .map_err(|e| ResearchError::InvalidInput(format!("{:#}", e)))?;
        info!("Starting ingestion of {} URLs", urls.len());

        let indexer = self.clone();
        let blocking_observer = Arc::clone(&observer);
        let (documents, records) =
            tokio::task::spawn_blocking(move || indexer.build_records(&urls, &*blocking_observer))
                .await
                .map_err(|e| {
                    ResearchError::Other(anyhow::anyhow!("Ingestion task failed: {}", e))
                })??;

        observer(IngestStage::Saving);
        let chunks = records.len();
        self.save(records).await?;

        let report = IngestReport {
            documents: documents.len(),
            sources: documents.into_iter().map(|d| d.source).collect(),
            chunks,
            index_path: self.index_path.clone(),
            elapsed: started.elapsed(),
        };

        observer(IngestStage::Complete);
        info!(
            "Indexed {} chunks from {} documents in {:?}",
            report.chunks, report.documents, report.elapsed
        );
        Ok(report)
    }

    /// Fetch, split and embed in memory; runs on the blocking pool
    fn build_records(
        &self,
        urls: &[String],
        observer: &(dyn Fn(IngestStage) + Send + Sync),
    ) -> Result<(Vec<Document>, Vec<EmbeddingRecord>)> {
        observer(IngestStage::Loading);
        let documents = crawler::fetch_documents(&self.http_client, urls)?;

        observer(IngestStage::Splitting);
        let chunks = split_documents(&documents, &self.chunking_config)
            .map_err(|e| ResearchError::Extraction(format!("{:#}", e)))?;

        if chunks.is_empty() {
            return Err(ResearchError::Extraction(
                "The articles produced no text to index".to_string(),
            ));
        }
        debug!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        observer(IngestStage::Embedding);
        let embeddings = self
            .ollama_client
            .generate_chunk_embeddings(&chunks)
            .map_err(|e| ResearchError::Embedding(format!("{:#}", e)))?;

        if embeddings.len() != chunks.len() {
            return Err(ResearchError::Embedding(format!(
                "Expected {} embeddings but received {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let records = chunks
            .iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| EmbeddingRecord::from_chunk(chunk, embedding))
            .collect();

        Ok((documents, records))
    }

    /// Write `records` beside the live index, then swap them in
    async fn save(&self, records: Vec<EmbeddingRecord>) -> Result<()> {
        let staging = sibling_path(&self.index_path, "staging");

        if staging.exists() {
            warn!("Removing leftover staging index at {}", staging.display());
            std::fs::remove_dir_all(&staging)?;
        }

        let written = VectorStore::create(&staging, records)
            .await
            .and_then(|store| {
                drop(store);
                VectorStore::replace_index(&staging, &self.index_path)
            });

        if let Err(e) = written {
            error!("Failed to save vector index: {}", e);
            if staging.exists() {
                if let Err(cleanup_err) = std::fs::remove_dir_all(&staging) {
                    warn!(
                        "Failed to remove staging index at {}: {}",
                        staging.display(),
                        cleanup_err
                    );
                }
            }
            return Err(e);
        }

        Ok(())
    }
}
