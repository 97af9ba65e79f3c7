#[cfg(test)]
mod tests;

use anyhow::{Result, bail};
use fancy_regex::Regex;
use itertools::Itertools;
use serde::Serialize;
use std::fmt::Write as _;
use std::sync::LazyLock;

use super::ChatMessage;
use crate::database::lancedb::ChunkMetadata;

const SYSTEM_PROMPT: &str = "You are a news research assistant. Answer the question using only \
the extracted article passages you are given. If the passages do not contain the answer, say \
that you don't know instead of making one up. Always finish with a line starting with \
\"SOURCES:\" that lists the source URLs you relied on, separated by commas.";

const SEPARATOR: &str = "=========";

static SOURCES_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(?<![A-Za-z])SOURCES?\s*:").expect("valid regex"));

static URL_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://").expect("valid regex"));

/// The model's reply split into prose and cited article URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<String>,
}

/// Build the chat turns asking `question` over the retrieved `chunks`
#[inline]
pub fn build_messages(question: &str, chunks: &[ChunkMetadata]) -> Vec<ChatMessage> {
    let mut user = String::new();
    let _ = writeln!(user, "QUESTION: {}", question.trim());
    let _ = writeln!(user, "{}", SEPARATOR);

    for chunk in chunks {
        let _ = writeln!(user, "Content: {}", chunk.content);
        let _ = writeln!(user, "Source: {}", chunk.source);
        user.push('\n');
    }

    let _ = writeln!(user, "{}", SEPARATOR);
    user.push_str("FINAL ANSWER:");

    vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(user)]
}

/// Split a completion into answer text and the sources it cites.
///
/// Cited URLs not among `retrieved_sources` are dropped.
#[inline]
pub fn parse_answer(completion: &str, retrieved_sources: &[String]) -> Result<Answer> {
    let marker = SOURCES_MARKER.find(completion).ok().flatten();

    let (answer, cited) = match marker {
        Some(m) => {
            let (answer, rest) = completion.split_at(m.start());
            (answer, rest.split_at(m.end() - m.start()).1)
        }
        None => (completion, ""),
    };

    let answer = answer
        .trim()
        .trim_end_matches(|c: char| c == '*' || c == '#' || c.is_whitespace())
        .to_string();

    if answer.is_empty() {
        bail!("The model returned an empty answer");
    }

    // Longest first, so a source that prefixes another never shadows it
    let mut candidates: Vec<&String> = retrieved_sources.iter().collect();
    candidates.sort_by_key(|source| std::cmp::Reverse(source.len()));

    let sources = URL_START
        .find_iter(cited)
        .filter_map(|m| m.ok())
        .filter_map(|m| cited.get(m.start()..))
        .filter_map(|tail| cited_source(tail, &candidates))
        .unique()
        .cloned()
        .collect();

    Ok(Answer { answer, sources })
}

/// The retrieved source that `tail` starts with, if the URL ends right after it.
///
/// Sources are compared whole rather than tokenised, since parentheses and
/// commas are legal inside a URL.
fn cited_source<'a>(tail: &str, candidates: &[&'a String]) -> Option<&'a String> {
    candidates.iter().copied().find(|source| {
        let stem = source.trim_end_matches('/');
        !stem.is_empty()
            && tail
                .strip_prefix(stem)
                .map(|rest| rest.strip_prefix('/').unwrap_or(rest))
                .is_some_and(ends_url)
    })
}

/// Whether `rest` can follow the last character of a cited URL
fn ends_url(rest: &str) -> bool {
    let closes = |c: char| c.is_whitespace() || matches!(c, ')' | ']' | '>' | '"' | '\'' | '`' | '*');

    let mut chars = rest.chars();
    match chars.next() {
        None => true,
        Some(c) if closes(c) => true,
        // Sentence or list punctuation only when nothing of the URL follows it
        Some(',' | '.' | ';' | ':' | '!' | '?') => chars.next().is_none_or(closes),
        Some(_) => false,
    }
}
