use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::{ApiKey, Config};
use crate::embeddings::OllamaClient;
use crate::indexer::{IngestStage, Indexer};
use crate::query::QueryEngine;
use crate::{ResearchError, Result, server};

/// Load the configuration from the base directory
#[inline]
pub fn load_config() -> Result<Config> {
    Config::load_default().map_err(|e| ResearchError::Config(format!("{:#}", e)))
}

/// The LLM credential every pipeline command needs before taking input
#[inline]
pub fn require_api_key() -> Result<ApiKey> {
    ApiKey::from_env().map_err(|_| ResearchError::MissingApiKey)
}

/// Build a fresh vector index from `urls`, replacing the previous one
#[inline]
pub async fn ingest_urls(urls: &[String]) -> Result<()> {
    let config = load_config()?;
    let indexer = Indexer::new(&config)?;

    let bar = if console::user_attended_stderr() {
        let bar = ProgressBar::new_spinner().with_style(
            ProgressStyle::with_template("{spinner} {msg}").expect("style template is valid"),
        );
        bar.enable_steady_tick(Duration::from_millis(120));
        bar
    } else {
        ProgressBar::hidden()
    };

    let spinner = bar.clone();
    let result = indexer
        .ingest(urls, move |stage: IngestStage| {
            spinner.set_message(stage.message());
            if stage != IngestStage::Complete {
                info!("{}", stage);
            }
        })
        .await;

    match result {
        Ok(report) => {
            bar.finish_with_message(IngestStage::Complete.message());
            println!(
                "{} {} chunks from {} articles in {:.1}s",
                style("Indexed").green().bold(),
                report.chunks,
                report.documents,
                report.elapsed.as_secs_f64()
            );
            for source in &report.sources {
                println!("  🔗 {}", style(source).cyan());
            }
            println!(
                "Vector index: {}",
                style(report.index_path.display()).dim()
            );
            Ok(())
        }
        Err(e) => {
            bar.abandon();
            error!("Ingestion failed: {}", e);
            Err(e)
        }
    }
}

/// Answer `question` from the current index and print the cited sources
#[inline]
pub async fn ask_question(question: &str, api_key: ApiKey) -> Result<()> {
    let config = load_config()?;
    let engine = QueryEngine::new(&config, api_key)?;

    let answer = engine.ask(question).await?;

    println!("{}", style("Answer:").bold().yellow());
    println!("{}", answer.answer);

    if !answer.sources.is_empty() {
        println!();
        println!("{}", style("Sources:").bold().yellow());
        for source in &answer.sources {
            println!("  🔗 {}", style(source).cyan().underlined());
        }
    }

    Ok(())
}

/// Serve the web UI, optionally overriding the configured address
#[inline]
pub async fn serve_ui(host: Option<String>, port: Option<u16>, api_key: ApiKey) -> Result<()> {
    let mut config = load_config()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config
        .validate()
        .map_err(|e| ResearchError::Config(e.to_string()))?;

    warn_if_ollama_unready(&config).await;

    println!(
        "🌐 News Research Tool at {}",
        style(format!(
            "http://{}:{}",
            config.server.host, config.server.port
        ))
        .cyan()
    );
    println!("Press Ctrl+C to stop the server");

    tokio::select! {
        result = server::serve(&config, api_key) => result,
        _ = tokio::signal::ctrl_c() => {
            println!("\n📴 Received interrupt signal, shutting down...");
            Ok(())
        }
    }
}

/// The UI still starts without Ollama; processing URLs will fail until it is up
async fn warn_if_ollama_unready(config: &Config) {
    let client = match OllamaClient::new(config) {
        Ok(client) => client,
        Err(e) => {
            warn!("⚠️  Invalid Ollama settings: {:#}", e);
            return;
        }
    };

    match tokio::task::spawn_blocking(move || client.health_check()).await {
        Ok(Ok(())) => info!(
            "✅ Ollama ready at {}:{} with model {}",
            config.ollama.host, config.ollama.port, config.ollama.model
        ),
        Ok(Err(e)) => {
            warn!("⚠️  Ollama is not ready: {:#}", e);
            println!(
                "{}",
                style("Warning: Ollama is not ready. Processing URLs will fail until it is.")
                    .yellow()
            );
        }
        Err(e) => warn!("Ollama health check task failed: {}", e),
    }
}
