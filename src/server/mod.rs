// Web UI: one page with URL inputs, a question box, and the answer

pub mod page;


use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use serde::Deserialize;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::{ApiKey, Config};
use crate::indexer::{IngestStage, Indexer};
use crate::query::QueryEngine;
use crate::{ResearchError, Result};

use self::page::{PageRenderer, PageView};

/// Shared state behind every request handler
pub struct AppState {
    pub indexer: Indexer,
    pub query_engine: QueryEngine,
    pub pages: PageRenderer,
    /// Queries hold it shared, ingestion exclusively, so a query never sees a half-swapped index
    pub index_lock: RwLock<()>,
}

impl AppState {
    #[inline]
    pub fn new(config: &Config, api_key: ApiKey) -> Result<Self> {
        Ok(Self {
            indexer: Indexer::new(config)?,
            query_engine: QueryEngine::new(config, api_key)?,
            pages: PageRenderer::new(config.server.signature.clone())?,
            index_lock: RwLock::new(()),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProcessForm {
    url1: String,
    url2: String,
    url3: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AskForm {
    question: String,
    url1: String,
    url2: String,
    url3: String,
}

struct PageError(anyhow::Error);

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        error!("Failed to render page: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render page: {:#}", self.0),
        )
            .into_response()
    }
}

impl From<anyhow::Error> for PageError {
    fn from(error: anyhow::Error) -> Self {
        Self(error)
    }
}

type PageResult = std::result::Result<Html<String>, PageError>;

/// Build the application router
#[inline]
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/process", post(process))
        .route("/ask", post(ask))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address and serve until the process is stopped
#[inline]
pub async fn serve(config: &Config, api_key: ApiKey) -> Result<()> {
    let state = Arc::new(AppState::new(config, api_key)?);
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("News research UI listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn index(State(state): State<Arc<AppState>>) -> PageResult {
    Ok(Html(state.pages.render(&PageView::with_urls(Vec::new()))?))
}

async fn health() -> &'static str {
    "ok"
}

async fn process(State(state): State<Arc<AppState>>, Form(form): Form<ProcessForm>) -> PageResult {
    let urls = vec![form.url1, form.url2, form.url3];
    let mut view = PageView::with_urls(urls.clone());

    // Nothing to process; redisplay as with a blank question
    if urls.iter().all(|url| url.trim().is_empty()) {
        return Ok(Html(state.pages.render(&view)?));
    }

    let stages = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&stages);
    let result = {
        let _guard = state.index_lock.write().await;
        state
            .indexer
            .ingest(&urls, move |stage: IngestStage| {
                if let Ok(mut stages) = recorded.lock() {
                    stages.push(stage);
                }
            })
            .await
    };

    view.stages = stages.lock().map(|s| s.clone()).unwrap_or_default();
    match result {
        Ok(report) => info!(
            "Processed {} articles into {} chunks",
            report.documents, report.chunks
        ),
        Err(e) => {
            warn!("Ingestion failed: {}", e);
            view.ingest_error = Some(user_message(&e));
        }
    }

    Ok(Html(state.pages.render(&view)?))
}

async fn ask(State(state): State<Arc<AppState>>, Form(form): Form<AskForm>) -> PageResult {
    let mut view = PageView::with_urls(vec![form.url1, form.url2, form.url3]);
    view.question = form.question;

    // A blank question just redisplays the page
    if !view.question.trim().is_empty() {
        let result = {
            let _guard = state.index_lock.read().await;
            state.query_engine.ask(&view.question).await
        };

        match result {
            Ok(answer) => view.answer = Some(answer),
            Err(e) => {
                warn!("Query failed: {}", e);
                view.query_error = Some(user_message(&e));
            }
        }
    }

    Ok(Html(state.pages.render(&view)?))
}

/// The single line shown to the user for a failed action
fn user_message(error: &ResearchError) -> String {
    match error {
        ResearchError::InvalidInput(message) => message.clone(),
        other => other.to_string(),
    }
}
