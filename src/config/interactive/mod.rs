
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use std::time::Duration;
use url::Url;

use super::settings::DEFAULT_OLLAMA_PORT;
use super::{API_KEY_ENV, ApiKey, Config, ConfigError, LlmConfig, OllamaConfig};
use crate::embeddings::OllamaClient;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 News Research Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Embedding Configuration").bold().yellow());
    eprintln!("Configure the Ollama instance that embeds article chunks and questions.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Answer Generation").bold().yellow());
    eprintln!("Configure the Mistral chat model used to answer questions.");
    eprintln!();

    configure_llm(&mut config.llm)?;

    config.retrieval.top_k = Input::new()
        .with_prompt("Chunks retrieved per question")
        .default(config.retrieval.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=20).contains(input) {
                Ok(())
            } else {
                Err("Must be between 1 and 20")
            }
        })
        .interact_text()?;

    eprintln!();
    eprintln!("{}", style("Checking Ollama...").yellow());

    if test_ollama_connection(&config) {
        eprintln!("{}", style("✓ Ollama is up and the model is pulled").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Ollama is not ready").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before processing URLs.");
    }

    if ApiKey::from_env().is_err() {
        eprintln!(
            "{}",
            style(format!(
                "⚠ Warning: {} is not set. Add it to your environment or `.env` file.",
                API_KEY_ENV
            ))
            .yellow()
        );
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!(
            "{} {}",
            style("✓ Saved to").green(),
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Nothing was saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!("  Model: {}", style(&config.ollama.model).cyan());
    eprintln!("  Batch Size: {}", style(config.ollama.batch_size).cyan());
    eprintln!(
        "  Embedding Dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    );
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!("{}", style("LLM Settings:").bold().yellow());
    eprintln!("  API Base: {}", style(&config.llm.api_base).cyan());
    eprintln!("  Model: {}", style(&config.llm.model).cyan());
    eprintln!("  Temperature: {}", style(config.llm.temperature).cyan());
    eprintln!("  Timeout: {}s", style(config.llm.timeout_seconds).cyan());
    let key_status = if ApiKey::from_env().is_ok() {
        style("set".to_string()).green()
    } else {
        style("missing".to_string()).red()
    };
    eprintln!("  {}: {}", API_KEY_ENV, key_status);

    eprintln!();
    eprintln!("{}", style("Retrieval & Server:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Web UI: {}",
        style(format!(
            "http://{}:{}",
            config.server.host, config.server.port
        ))
        .cyan()
    );
    eprintln!("  Signature: {}", style(&config.server.signature).cyan());

    eprintln!();
    eprintln!(
        "Vector index: {}",
        style(config.vector_index_path().display()).dim()
    );
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    let config_dir = Config::config_dir().context("Failed to resolve configuration directory")?;
    Config::load(&config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No usable configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.clone(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Loaded configuration.").green());
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let current = ollama
        .ollama_url()
        .map(|url| url.as_str().trim_end_matches('/').to_string())
        .unwrap_or_default();

    let address: String = Input::new()
        .with_prompt("Ollama address")
        .default(current)
        .validate_with(|input: &String| parse_ollama_address(input).map(|_| ()))
        .interact_text()?;
    let (protocol, host, port) = parse_ollama_address(&address)?;

    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.model.clone())
        .validate_with(|input: &String| ollama.clone().set_model(input.clone()))
        .interact_text()?;

    let embedding_dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(ollama.embedding_dimension)
        .validate_with(|input: &u32| ollama.clone().set_embedding_dimension(*input))
        .interact_text()?;

    ollama.set_protocol(protocol)?;
    ollama.set_host(host)?;
    ollama.set_port(port)?;
    ollama.set_model(model)?;
    ollama.set_embedding_dimension(embedding_dimension)?;

    Ok(())
}

fn configure_llm(llm: &mut LlmConfig) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Chat model")
        .default(llm.model.clone())
        .validate_with(|input: &String| llm.clone().set_model(input.clone()))
        .interact_text()?;

    let temperature: f32 = Input::new()
        .with_prompt("Sampling temperature")
        .default(llm.temperature)
        .validate_with(|input: &f32| llm.clone().set_temperature(*input))
        .interact_text()?;

    llm.set_model(model)?;
    llm.set_temperature(temperature)?;

    Ok(())
}

/// Split `scheme://host[:port]`; without a port Ollama's 11434 is assumed
fn parse_ollama_address(input: &str) -> Result<(String, String, u16), ConfigError> {
    let invalid = || ConfigError::InvalidUrl(input.to_string());
    let url = Url::parse(input.trim()).map_err(|_| invalid())?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
    }
    let host = url.host_str().filter(|h| !h.is_empty()).ok_or_else(invalid)?;
    let port = url.port().unwrap_or(DEFAULT_OLLAMA_PORT);

    Ok((url.scheme().to_string(), host.to_string(), port))
}

fn test_ollama_connection(config: &Config) -> bool {
    OllamaClient::new(config)
        .map(|client| client.with_timeout(Duration::from_secs(5)))
        .and_then(|client| client.health_check())
        .map_err(|e| eprintln!("  {}", style(format!("{:#}", e)).dim()))
        .is_ok()
}
