#![allow(dead_code, reason = "each test binary uses a different subset")]

//! Fakes shared by the integration tests: one mock server plays the article
//! sites, Ollama and the Mistral chat endpoint.

mod fake_embedder;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use news_research::config::{ApiKey, Config, OllamaConfig};

pub use fake_embedder::{DIMENSION, FakeEmbedder};

pub struct TestEnv {
    pub server: MockServer,
    pub config: Config,
    _temp_dir: TempDir,
}

impl TestEnv {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(FakeEmbedder)
            .mount(&server)
            .await;

        let temp_dir = TempDir::new().expect("should create temp dir");
        let mut config = Config {
            ollama: OllamaConfig {
                host: server.address().ip().to_string(),
                port: server.address().port(),
                embedding_dimension: DIMENSION as u32,
                ..OllamaConfig::default()
            },
            base_dir: temp_dir.path().to_path_buf(),
            ..Config::default()
        };
        config.llm.api_base = format!("{}/v1", server.uri());

        Self {
            server,
            config,
            _temp_dir: temp_dir,
        }
    }

    /// Serve `text` as a one-paragraph article at `route`, returning its URL
    pub async fn mount_article(&self, route: &str, text: &str) -> String {
        let body = format!(
            "<html><head><title>{route}</title></head><body><nav>Menu</nav>\
             <article><p>{text}</p></article></body></html>"
        );
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
            .mount(&self.server)
            .await;
        format!("{}{}", self.server.uri(), route)
    }

    /// A route that always fails
    pub async fn mount_broken_article(&self, route: &str) -> String {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(500))
            .mount(&self.server)
            .await;
        format!("{}{}", self.server.uri(), route)
    }

    /// Make the chat endpoint return `content` as the completion
    pub async fn mount_completion(&self, content: &str) {
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cmpl-test",
                "object": "chat.completion",
                "model": "mistral-small-latest",
                "choices": [{
                    "index": 0,
                    "message": { "role": "assistant", "content": content },
                    "finish_reason": "stop"
                }]
            })))
            .mount(&self.server)
            .await;
    }

    /// Bodies of every chat request received so far
    pub async fn chat_requests(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|request| request.url.path() == "/v1/chat/completions")
            .map(|request| String::from_utf8_lossy(&request.body).into_owned())
            .collect()
    }
}

pub fn api_key() -> ApiKey {
    ApiKey::from_value(Some("test-key".to_string())).expect("key is set")
}
