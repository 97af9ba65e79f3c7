pub mod extractor;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, bail};
use itertools::Itertools;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use ureq::Agent;
use url::Url;

use self::extractor::extract_content;
use crate::ResearchError;

/// Most article URLs accepted in a single ingestion run
pub const MAX_URLS: usize = 3;

/// Configuration for fetching article pages
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// User agent string to use for requests
    pub user_agent: String,
    /// Timeout for HTTP requests in seconds
    pub timeout_seconds: u64,
}

impl Default for CrawlerConfig {
    #[inline]
    fn default() -> Self {
        Self {
            user_agent: "news-research/0.1.0 (Article Indexer)".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// Visible text of one fetched article, tagged with where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// URL exactly as the user supplied it (after trimming)
    pub source: String,
    pub title: String,
    pub text: String,
}

/// Blocking HTTP client for article pages
#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: Agent,
}

impl HttpClient {
    #[inline]
    pub fn new(config: &CrawlerConfig) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_seconds)))
            .user_agent(&config.user_agent)
            .http_status_as_error(false)
            .build()
            .into();

        Self { agent }
    }

    /// GET `url` and return the body; any non-2xx status is an error
    #[inline]
    pub fn get(&self, url: &str) -> Result<String> {
        let mut response = self
            .agent
            .get(url)
            .call()
            .with_context(|| format!("Could not reach {}", url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("HTTP error {} fetching {}", status.as_u16(), url);
        }

        let body = response
            .body_mut()
            .read_to_string()
            .with_context(|| format!("Failed to read page body from {}", url))?;
        debug!("GET {} returned {} bytes", url, body.len());
        Ok(body)
    }
}

impl Default for HttpClient {
    #[inline]
    fn default() -> Self {
        Self::new(&CrawlerConfig::default())
    }
}

/// Why an article could not be turned into a [`Document`]
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0:#}")]
    Network(anyhow::Error),
    #[error("{0:#}")]
    Extraction(anyhow::Error),
}

impl From<FetchError> for ResearchError {
    #[inline]
    fn from(error: FetchError) -> Self {
        match error {
            FetchError::Network(e) => Self::Network(format!("{:#}", e)),
            FetchError::Extraction(e) => Self::Extraction(format!("{:#}", e)),
        }
    }
}

/// Parse `input` as an absolute http(s) URL with a host
#[inline]
pub fn validate_url(input: &str) -> Result<Url> {
    let url = Url::parse(input).with_context(|| format!("Invalid URL format: {}", input))?;

    if !matches!(url.scheme(), "http" | "https") {
        bail!("Only http and https URLs are supported: {}", input);
    }
    if url.host_str().is_none_or(str::is_empty) {
        bail!("URL has no host: {}", input);
    }

    Ok(url)
}

/// Turn raw form/CLI input into the ordered list of URLs to ingest.
///
/// Blank entries are dropped and repeats keep their first position.
#[inline]
pub fn prepare_urls<S: AsRef<str>>(inputs: &[S]) -> Result<Vec<String>> {
    let urls: Vec<String> = inputs
        .iter()
        .map(|input| input.as_ref().trim())
        .filter(|input| !input.is_empty())
        .unique()
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        bail!("Enter at least one article URL");
    }

    if urls.len() > MAX_URLS {
        bail!(
            "At most {} article URLs can be processed at once (got {})",
            MAX_URLS,
            urls.len()
        );
    }

    for url in &urls {
        validate_url(url)?;
    }

    Ok(urls)
}

/// Fetch every URL in order and extract its readable text.
///
/// The first page that cannot be fetched or yields no text fails the whole batch.
#[inline]
pub fn fetch_documents(
    client: &HttpClient,
    urls: &[String],
) -> std::result::Result<Vec<Document>, FetchError> {
    urls.iter()
        .map(|url| {
            let html = client.get(url).map_err(FetchError::Network)?;
            let content = extract_content(&html)
                .with_context(|| format!("Failed to extract text from {}", url))
                .map_err(FetchError::Extraction)?;

            info!(
                "Loaded '{}' from {} ({} chars)",
                content.title,
                url,
                content.text.chars().count()
            );

            Ok(Document {
                source: url.clone(),
                title: content.title,
                text: content.text,
            })
        })
        .collect()
}
