use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use news_research::commands::{ask_question, ingest_urls, require_api_key, serve_ui};
use news_research::config::{load_dotenv, run_interactive_config, show_config};
use news_research::{ResearchError, Result};

#[derive(Parser)]
#[command(name = "news-research")]
#[command(about = "Ask questions about news articles, answered with cited sources")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web UI
    Serve {
        /// Address to bind instead of the configured host
        #[arg(long)]
        host: Option<String>,
        /// Port to bind instead of the configured port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Build the vector index from up to three article URLs
    Ingest {
        /// Article URLs
        #[arg(required = true, num_args = 1..=3)]
        urls: Vec<String>,
    },
    /// Ask a question about the indexed articles
    Ask {
        /// The question to answer
        question: String,
    },
    /// Configure Ollama, the chat model and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e @ ResearchError::MissingApiKey) => {
            eprintln!("{}", style(format!("❌ {}", e)).red().bold());
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{} {}", style("❌ Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Serve { host, port } => {
            let api_key = require_api_key()?;
            serve_ui(host, port, api_key).await?;
        }
        Commands::Ingest { urls } => {
            require_api_key()?;
            ingest_urls(&urls).await?;
        }
        Commands::Ask { question } => {
            let api_key = require_api_key()?;
            ask_question(&question, api_key).await?;
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
    }

    Ok(())
}
