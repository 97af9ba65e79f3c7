#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Drives the web UI router through a full process-then-ask session

mod common;

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;
use url::form_urlencoded;

use common::{TestEnv, api_key};
use news_research::server::{AppState, build_router};

fn router(env: &TestEnv) -> Router {
    let state = AppState::new(&env.config, api_key()).expect("state should build");
    build_router(Arc::new(state))
}

async fn post_form(app: Router, uri: &str, fields: &[(&str, &str)]) -> (StatusCode, String) {
    let body = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(fields)
        .finish();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .expect("request should build"),
        )
        .await
        .expect("request should complete");

    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    let html = String::from_utf8(bytes.to_vec())
        .expect("body should be utf-8")
        .replace("&#x2f;", "/");
    (status, html)
}

#[tokio::test]
async fn process_then_ask_shows_answer_and_links() {
    let env = TestEnv::start().await;
    let acme = env
        .mount_article("/acme", "Acme Corp posted record profits this quarter.")
        .await;
    env.mount_completion(&format!(
        "Acme Corp posted **record** profits.\nSOURCES: {}",
        acme
    ))
    .await;
    let app = router(&env);

    let (status, html) = post_form(
        app.clone(),
        "/process",
        &[("url1", acme.as_str()), ("url2", ""), ("url3", "")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("📥 Loading articles..."));
    assert!(html.contains("🔎 Generating embeddings..."));
    assert!(html.contains("✅ Processing complete!"));
    assert!(!html.contains("❌ Error"));

    let (status, html) = post_form(
        app,
        "/ask",
        &[
            ("question", "What did Acme Corp report?"),
            ("url1", acme.as_str()),
        ],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(html.contains("Answer:"));
    assert!(html.contains("<strong>record</strong>"));
    assert!(html.contains("Sources:"));
    assert!(html.contains(&format!(r#"href="{}""#, acme)));
    assert!(html.contains(&format!("🔗 {}", acme)));
    assert!(!html.contains("❌ Error"));
}

#[tokio::test]
async fn failed_fetch_shows_single_error_line() {
    let env = TestEnv::start().await;
    let broken = env.mount_broken_article("/gone").await;
    let app = router(&env);

    let (status, html) = post_form(app, "/process", &[("url1", broken.as_str())]).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(html.matches("❌ Error:").count(), 1);
    assert!(html.contains("HTTP error 500"));
    assert!(!html.contains("✅ Processing complete!"));
}
