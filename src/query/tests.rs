use super::*;
use crate::config::OllamaConfig;
use crate::database::lancedb::{ChunkMetadata, EmbeddingRecord};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACME: &str = "https://news.example.com/acme";
const WEATHER: &str = "https://news.example.com/weather";

fn config_for(server: &MockServer, temp_dir: &TempDir, top_k: usize) -> Config {
    let mut config = Config {
        ollama: OllamaConfig {
            host: server.address().ip().to_string(),
            port: server.address().port(),
            embedding_dimension: 3,
            ..OllamaConfig::default()
        },
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    config.llm.api_base = format!("{}/v1", server.uri());
    config.retrieval.top_k = top_k;
    config
}

fn api_key() -> ApiKey {
    ApiKey::from_value(Some("test-key".to_string())).expect("key is set")
}

fn record(source: &str, content: &str, vector: Vec<f32>) -> EmbeddingRecord {
    EmbeddingRecord {
        id: format!("{}-{}", source, content.len()),
        vector,
        metadata: ChunkMetadata {
            source: source.to_string(),
            content: content.to_string(),
            chunk_index: 0,
            char_count: content.chars().count() as u32,
            created_at: "2024-01-01T00:00:00Z".to_string(),
        },
    }
}

async fn build_index(config: &Config) {
    VectorStore::create(
        &config.vector_index_path(),
        vec![
            record(
                ACME,
                "Acme Corp posted record profits this quarter.",
                vec![1.0, 0.0, 0.0],
            ),
            record(WEATHER, "Rain is expected tomorrow.", vec![0.0, 1.0, 0.0]),
        ],
    )
    .await
    .expect("index should be created");
}

async fn mount_question_embedding(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.9, 0.1, 0.0]]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn ask_without_index_fails() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let engine =
        QueryEngine::new(&config_for(&server, &temp_dir, 4), api_key()).expect("engine builds");

    let error = engine
        .ask("What did Acme Corp report?")
        .await
        .expect_err("no index should fail");

    assert!(matches!(error, ResearchError::NoIndex(_)));
    assert!(error.to_string().contains("Process some article URLs first"));
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.is_empty());
}

#[tokio::test]
async fn blank_question_is_rejected() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let engine =
        QueryEngine::new(&config_for(&server, &temp_dir, 4), api_key()).expect("engine builds");

    assert!(matches!(
        engine.ask("   ").await,
        Err(ResearchError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn retrieve_orders_by_distance_and_honours_top_k() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, &temp_dir, 1);
    build_index(&config).await;
    mount_question_embedding(&server).await;

    let engine = QueryEngine::new(&config, api_key()).expect("engine builds");
    let results = engine
        .retrieve("What did Acme Corp report?")
        .await
        .expect("retrieval should succeed");

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk_metadata.source, ACME);
}

#[tokio::test]
async fn ask_sends_context_and_parses_sources() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, &temp_dir, 4);
    build_index(&config).await;
    mount_question_embedding(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Acme Corp posted record profits"))
        .and(body_string_contains("Source: https://news.example.com/acme"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"message": {
                "role": "assistant",
                "content": "Acme Corp reported record profits this quarter.\nSOURCES: https://news.example.com/acme, https://made-up.example.org/"
            }}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = QueryEngine::new(&config, api_key()).expect("engine builds");
    let answer = engine
        .ask("What did Acme Corp report?")
        .await
        .expect("question should be answered");

    assert_eq!(
        answer.answer,
        "Acme Corp reported record profits this quarter."
    );
    assert_eq!(answer.sources, vec![ACME]);
}

#[tokio::test]
async fn llm_failure_is_reported_as_llm_error() {
    let server = MockServer::start().await;
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = config_for(&server, &temp_dir, 4);
    build_index(&config).await;
    mount_question_embedding(&server).await;

    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let engine = QueryEngine::new(&config, api_key()).expect("engine builds");
    let error = engine
        .ask("What did Acme Corp report?")
        .await
        .expect_err("503 should fail");

    assert!(matches!(error, ResearchError::Llm(_)));
    assert!(error.to_string().contains("503"));
}
