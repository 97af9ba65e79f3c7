
use anyhow::{Context, Result};
use minijinja::{Environment, Value, context};
use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use serde::Serialize;

use crate::crawler::MAX_URLS;
use crate::indexer::IngestStage;
use crate::query::Answer;

const PAGE_TEMPLATE: &str = "page.html";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct StatusLine {
    text: &'static str,
    complete: bool,
}

/// Everything shown on the single research page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageView {
    pub urls: Vec<String>,
    pub stages: Vec<IngestStage>,
    pub ingest_error: Option<String>,
    pub question: String,
    pub answer: Option<Answer>,
    pub query_error: Option<String>,
}

impl PageView {
    /// A view keeping the user's URL inputs, padded to the number of fields
    #[inline]
    pub fn with_urls(urls: Vec<String>) -> Self {
        let mut urls = urls;
        urls.resize(MAX_URLS, String::new());
        Self {
            urls,
            ..Self::default()
        }
    }
}

/// Renders [`PageView`]s through the embedded HTML template
#[derive(Debug)]
pub struct PageRenderer {
    env: Environment<'static>,
    signature: String,
}

impl PageRenderer {
    #[inline]
    pub fn new(signature: impl Into<String>) -> Result<Self> {
        let mut env = Environment::new();
        env.add_template(PAGE_TEMPLATE, include_str!("page.html"))
            .context("Failed to load page template")?;

        Ok(Self {
            env,
            signature: signature.into(),
        })
    }

    #[inline]
    pub fn render(&self, view: &PageView) -> Result<String> {
        let template = self
            .env
            .get_template(PAGE_TEMPLATE)
            .context("Page template missing")?;

        let mut urls = view.urls.clone();
        urls.resize(MAX_URLS, String::new());

        let status_lines: Vec<StatusLine> = view
            .stages
            .iter()
            .filter(|stage| {
                matches!(
                    stage,
                    IngestStage::Loading | IngestStage::Embedding | IngestStage::Complete
                )
            })
            .map(|stage| StatusLine {
                text: stage.message(),
                complete: *stage == IngestStage::Complete,
            })
            .collect();

        // Markdown is rendered with raw HTML escaped, so the output is safe to embed
        let answer_html = view
            .answer
            .as_ref()
            .map(|answer| Value::from_safe_string(render_markdown(&answer.answer)));
        let sources = view
            .answer
            .as_ref()
            .map(|answer| answer.sources.clone())
            .unwrap_or_default();

        template
            .render(context! {
                urls => urls,
                status_lines => status_lines,
                ingest_error => view.ingest_error,
                question => view.question,
                answer_html => answer_html,
                sources => sources,
                query_error => view.query_error,
                signature => self.signature,
            })
            .context("Failed to render page")
    }
}

/// Render LLM markdown to HTML, escaping raw HTML and dropping non-web links
#[inline]
pub fn render_markdown(markdown: &str) -> String {
    let mut skipping_link = false;
    let events = Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES)
        .filter_map(|event| match event {
            Event::Html(html) | Event::InlineHtml(html) => Some(Event::Text(html)),
            Event::Start(Tag::Link { ref dest_url, .. }) if !is_web_link(dest_url) => {
                skipping_link = true;
                None
            }
            Event::End(TagEnd::Link) if skipping_link => {
                skipping_link = false;
                None
            }
            other => Some(other),
        });

    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, events);
    html
}

fn is_web_link(url: &str) -> bool {
    let lower = url.trim().to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with('#')
}
