
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::Config;
use crate::embeddings::chunking::ContentChunk;

/// all-MiniLM-L6-v2 produces 384-dimensional vectors
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 384;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Blocking client for Ollama's `/api/embed` endpoint
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: Url,
    model: String,
    batch_size: usize,
    embedding_dimension: usize,
    agent: ureq::Agent,
    retry_attempts: u32,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    #[serde(default)]
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TaggedModel>,
}

#[derive(Debug, Deserialize)]
struct TaggedModel {
    name: String,
}

/// A vector together with the text it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub text: String,
    pub embedding: Vec<f32>,
    pub chunk_index: Option<usize>,
    pub source: Option<String>,
}

/// Outcome of one failed HTTP attempt
enum AttemptError {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

impl OllamaClient {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        Ok(Self {
            base_url,
            model: config.ollama.model.clone(),
            batch_size: (config.ollama.batch_size as usize).max(1),
            embedding_dimension: config.ollama.embedding_dimension as usize,
            agent: build_agent(REQUEST_TIMEOUT),
            retry_attempts: config.ollama.retry_attempts.max(1),
        })
    }

    #[inline]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.agent = build_agent(timeout);
        self
    }

    #[inline]
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts.max(1);
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Check the server answers and has the configured model pulled
    #[inline]
    pub fn health_check(&self) -> Result<()> {
        let models = self.list_models().context("Ollama server is not reachable")?;

        // A model pulled as "all-minilm" is listed as "all-minilm:latest"
        let wanted = normalize_model_name(&self.model);
        if !models.iter().any(|name| normalize_model_name(name) == wanted) {
            bail!(
                "Model '{}' is not pulled. Run `ollama pull {}` (available: {})",
                self.model,
                self.model,
                models.join(", ")
            );
        }

        info!("Ollama at {} serves model {}", self.base_url, self.model);
        Ok(())
    }

    /// Names of the models the server has pulled
    #[inline]
    pub fn list_models(&self) -> Result<Vec<String>> {
        let url = self.endpoint("api/tags")?;
        let body = self.send_with_retry(|| self.agent.get(url.as_str()).call())?;

        let tags: TagsResponse =
            serde_json::from_str(&body).context("Failed to parse model list")?;
        debug!("Ollama lists {} models", tags.models.len());
        Ok(tags.models.into_iter().map(|model| model.name).collect())
    }

    /// Embed one text, typically a question
    #[inline]
    pub fn generate_embedding(&self, text: &str) -> Result<EmbeddingResult> {
        self.generate_embeddings_batch(&[text.to_string()])
            .context("Failed to generate embedding")?
            .pop()
            .ok_or_else(|| anyhow!("Embedding response contained no vectors"))
    }

    /// Embed `texts` in order, `batch_size` texts per request
    #[inline]
    pub fn generate_embeddings_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingResult>> {
        let mut results = Vec::with_capacity(texts.len());

        for (batch_number, batch) in texts.chunks(self.batch_size).enumerate() {
            let vectors = self.embed(batch).with_context(|| {
                format!(
                    "Embedding batch {} ({} texts) failed",
                    batch_number + 1,
                    batch.len()
                )
            })?;

            results.extend(
                batch
                    .iter()
                    .zip(vectors)
                    .map(|(text, embedding)| EmbeddingResult {
                        text: text.clone(),
                        embedding,
                        chunk_index: None,
                        source: None,
                    }),
            );
        }

        debug!("Embedded {} texts with {}", results.len(), self.model);
        Ok(results)
    }

    /// Embed chunks, tagging each result with its chunk's source and position
    #[inline]
    pub fn generate_chunk_embeddings(
        &self,
        chunks: &[ContentChunk],
    ) -> Result<Vec<EmbeddingResult>> {
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let mut results = self.generate_embeddings_batch(&texts)?;

        for (result, chunk) in results.iter_mut().zip(chunks) {
            result.chunk_index = Some(chunk.chunk_index);
            result.source = Some(chunk.source.clone());
        }

        Ok(results)
    }

    /// One `/api/embed` round trip; the reply must hold one vector of the
    /// configured dimension per input
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint("api/embed")?;
        let payload = serde_json::to_string(&EmbedRequest {
            model: &self.model,
            input: texts,
        })
        .context("Failed to serialize embedding request")?;

        let body = self.send_with_retry(|| {
            self.agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&payload)
        })?;

        let EmbedResponse { embeddings } =
            serde_json::from_str(&body).context("Failed to parse embedding response")?;

        if embeddings.len() != texts.len() {
            bail!(
                "Sent {} texts but received {} embeddings",
                texts.len(),
                embeddings.len()
            );
        }
        if let Some(vector) = embeddings
            .iter()
            .find(|vector| vector.len() != self.embedding_dimension)
        {
            bail!(
                "Model {} returned a {}-dimensional vector, expected {}",
                self.model,
                vector.len(),
                self.embedding_dimension
            );
        }

        Ok(embeddings)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .with_context(|| format!("Failed to build Ollama URL for {}", path))
    }

    /// Run `send` up to `retry_attempts` times. Server errors and transport
    /// failures are retried with a doubling delay; anything else fails at once.
    fn send_with_retry<F>(&self, send: F) -> Result<String>
    where
        F: Fn() -> Result<ureq::http::Response<ureq::Body>, ureq::Error>,
    {
        let mut delay = Duration::from_secs(1);
        let mut attempt = 1;

        loop {
            match read_response(send()) {
                Ok(body) => return Ok(body),
                Err(AttemptError::Fatal(error)) => return Err(error),
                Err(AttemptError::Retryable(error)) if attempt >= self.retry_attempts => {
                    return Err(error.context(format!(
                        "Ollama request failed after {} attempt(s)",
                        attempt
                    )));
                }
                Err(AttemptError::Retryable(error)) => {
                    warn!(
                        "Ollama request failed (attempt {}/{}): {:#}",
                        attempt, self.retry_attempts, error
                    );
                    std::thread::sleep(delay);
                    delay *= 2;
                    attempt += 1;
                }
            }
        }
    }
}

fn build_agent(timeout: Duration) -> ureq::Agent {
    // Error statuses are read as normal responses so Ollama's message can be reported
    ureq::Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

fn read_response(
    outcome: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
) -> Result<String, AttemptError> {
    let mut response = outcome.map_err(|error| match error {
        ureq::Error::ConnectionFailed
        | ureq::Error::HostNotFound
        | ureq::Error::Timeout(_)
        | ureq::Error::Io(_) => AttemptError::Retryable(anyhow!("Ollama unreachable: {}", error)),
        other => AttemptError::Fatal(anyhow!("Ollama request failed: {}", other)),
    })?;

    let status = response.status();
    let body = response
        .body_mut()
        .read_to_string()
        .map_err(|e| AttemptError::Retryable(anyhow!("Failed to read Ollama response: {}", e)))?;

    if status.is_success() {
        return Ok(body);
    }

    let excerpt: String = body.trim().chars().take(MAX_ERROR_BODY_CHARS).collect();
    let error = anyhow!("Ollama returned HTTP {}: {}", status.as_u16(), excerpt);
    if status.is_server_error() {
        Err(AttemptError::Retryable(error))
    } else {
        Err(AttemptError::Fatal(error))
    }
}

fn normalize_model_name(name: &str) -> &str {
    name.strip_suffix(":latest").unwrap_or(name)
}
