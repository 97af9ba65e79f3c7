
use anyhow::{Result, anyhow, bail};
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Elements whose text forms one paragraph of output
const BLOCK_TAGS: &[&str] = &[
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "li",
    "blockquote",
    "pre",
    "td",
    "th",
    "figcaption",
    "dt",
    "dd",
];

/// Never part of the readable article
const UNWANTED: &str = "script, style, noscript, template, svg, iframe, nav, footer, aside, \
    form, button, [role=navigation], [aria-hidden=true], .advertisement, .ads, .ad, .sidebar, \
    .menu, .navigation, .share, .social, .newsletter, .related, .cookie-banner";

/// Site chrome that only matters when falling back to the whole body
const BODY_CHROME: &str = "header, [role=banner], .site-header";

const MAIN_CONTENT: &str = "article, main, [role=main], #content, #main, .article-body, \
    .story-body, .post-content, .entry-content, .content, .main-content";

/// Represents extracted page content with metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContent {
    /// The page title
    pub title: String,
    /// Readable blocks in document order
    pub paragraphs: Vec<String>,
    /// Paragraphs joined by blank lines
    pub text: String,
}

/// Extract the visible article text from an HTML document
pub fn extract_content(html: &str) -> Result<ExtractedContent> {
    let document = Html::parse_document(html);
    let title = extract_title(&document)?;
    let region = clean_content(&document)?;

    let mut paragraphs = collect_blocks(&region)?;
    if paragraphs.is_empty() {
        // Markup without block elements, e.g. a plain text response
        let loose = collapse_whitespace(&region.root_element().text().collect::<String>());
        if !loose.is_empty() {
            paragraphs.push(loose);
        }
    }

    if paragraphs.is_empty() {
        bail!("No readable text found in page");
    }

    let text = paragraphs.join("\n\n");

    debug!(
        "Extracted content: title='{}', {} paragraphs, {} chars",
        title,
        paragraphs.len(),
        text.len()
    );

    Ok(ExtractedContent {
        title,
        paragraphs,
        text,
    })
}

/// Page title from `<title>`, falling back to the first heading
fn extract_title(document: &Html) -> Result<String> {
    let title_selector = parse_selector("title")?;
    let heading_selector = parse_selector("h1, h2")?;

    let title = document
        .select(&title_selector)
        .chain(document.select(&heading_selector))
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .find(|text| !text.is_empty());

    Ok(title.unwrap_or_else(|| "Untitled Document".to_string()))
}

/// Pick the main content region and strip everything that is not article text
fn clean_content(document: &Html) -> Result<Html> {
    let main_content_selector = parse_selector(MAIN_CONTENT)?;
    let body_selector = parse_selector("body")?;
    let unwanted_selector = parse_selector(UNWANTED)?;

    if let Some(main_element) = document
        .select(&main_content_selector)
        .find(|element| has_text(*element))
    {
        let mut cleaned_doc = Html::parse_fragment(&main_element.html());
        remove_unwanted_elements(&mut cleaned_doc, &unwanted_selector);
        return Ok(cleaned_doc);
    }

    let chrome_selector = parse_selector(BODY_CHROME)?;
    let mut cleaned_doc = match document.select(&body_selector).next() {
        Some(body_element) => Html::parse_fragment(&body_element.html()),
        None => document.clone(),
    };
    remove_unwanted_elements(&mut cleaned_doc, &unwanted_selector);
    remove_unwanted_elements(&mut cleaned_doc, &chrome_selector);
    Ok(cleaned_doc)
}

/// Text of every outermost block element, whitespace-collapsed
fn collect_blocks(region: &Html) -> Result<Vec<String>> {
    let block_selector = parse_selector(&BLOCK_TAGS.join(", "))?;

    let blocks = region
        .select(&block_selector)
        .filter(|element| !has_block_ancestor(*element))
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|text| !text.is_empty())
        .collect();

    Ok(blocks)
}

fn has_block_ancestor(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| BLOCK_TAGS.contains(&ancestor.value().name()))
}

fn has_text(element: ElementRef<'_>) -> bool {
    element.text().any(|text| !text.trim().is_empty())
}

// Helper function to remove unwanted elements from an HTML document
fn remove_unwanted_elements(document: &mut Html, unwanted_selector: &Selector) {
    // Collect node IDs first; detaching while selecting would alias the tree
    let unwanted_node_ids: Vec<_> = document
        .select(unwanted_selector)
        .map(|element| element.id())
        .collect();

    for node_id in unwanted_node_ids {
        if let Some(mut node) = document.tree.get_mut(node_id) {
            node.detach();
        }
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

fn parse_selector(selectors: &str) -> Result<Selector> {
    Selector::parse(selectors).map_err(|e| anyhow!("Failed to create CSS selector: {:?}", e))
}
