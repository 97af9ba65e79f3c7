// Configuration management module
// TOML settings under the base directory plus the API key from the environment

pub mod interactive;
pub mod settings;


pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    API_KEY_ENV, ApiKey, Config, ConfigError, HOME_ENV, LlmConfig, OllamaConfig,
    RetrievalConfig, ServerConfig,
};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}

/// Load a `.env` file from the working directory, if present
#[inline]
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}
