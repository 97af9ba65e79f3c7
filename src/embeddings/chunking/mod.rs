
use anyhow::{Result, bail};
use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::crawler::Document;

/// Maximum chunk length in characters
pub const CHUNK_SIZE: usize = 1000;
/// Characters shared between adjacent chunks
pub const CHUNK_OVERLAP: usize = 200;
/// Separators tried in order, coarsest first
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

/// Represents a chunk of content ready for embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChunk {
    /// The content text
    pub content: String,
    /// URL of the document this chunk came from
    pub source: String,
    /// The index of this chunk within its document
    pub chunk_index: usize,
    /// Length of `content` in characters
    pub char_count: usize,
}

/// Configuration for content chunking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: CHUNK_SIZE,
            chunk_overlap: CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("Chunk size must be greater than 0");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "Chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.separators.is_empty() {
            bail!("At least one separator is required");
        }
        Ok(())
    }
}

/// Split every document into overlapping chunks tagged with their source URL
#[inline]
pub fn split_documents(
    documents: &[Document],
    config: &ChunkingConfig,
) -> Result<Vec<ContentChunk>> {
    let mut chunks = Vec::new();

    for document in documents {
        let pieces = split_text(&document.text, config)?;
        debug!("Split {} into {} chunks", document.source, pieces.len());

        chunks.extend(
            pieces
                .into_iter()
                .enumerate()
                .map(|(chunk_index, content)| ContentChunk {
                    char_count: char_len(&content),
                    content,
                    source: document.source.clone(),
                    chunk_index,
                }),
        );
    }

    Ok(chunks)
}

/// Split text recursively on progressively finer separators.
///
/// Every returned chunk is trimmed, non-empty and at most `chunk_size`
/// characters long; consecutive chunks share up to `chunk_overlap` characters.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Result<Vec<String>> {
    config.validate()?;
    Ok(split_recursive(text, &config.separators, config))
}

fn split_recursive(text: &str, separators: &[String], config: &ChunkingConfig) -> Vec<String> {
    let mut final_chunks = Vec::new();
    let (separator, finer_separators) = choose_separator(text, separators);

    let mut good_splits: Vec<String> = Vec::new();
    for piece in split_keeping_separator(text, separator) {
        if char_len(&piece) < config.chunk_size {
            good_splits.push(piece);
            continue;
        }

        if !good_splits.is_empty() {
            final_chunks.extend(merge_splits(&good_splits, config));
            good_splits.clear();
        }

        if finer_separators.is_empty() {
            final_chunks.push(piece);
        } else {
            final_chunks.extend(split_recursive(&piece, finer_separators, config));
        }
    }

    if !good_splits.is_empty() {
        final_chunks.extend(merge_splits(&good_splits, config));
    }

    final_chunks
}

/// First separator present in `text`, plus the finer ones left to try
fn choose_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator.as_str()) {
            return (separator, &separators[i + 1..]);
        }
    }

    (separators.last().map_or("", String::as_str), &[])
}

/// Split on `separator`, attaching it to the start of each following piece
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    if separator.is_empty() {
        return text.chars().map(String::from).collect();
    }

    let mut parts = text.split(separator);
    let mut pieces: Vec<String> = parts.next().map(str::to_string).into_iter().collect();
    pieces.extend(parts.map(|part| format!("{}{}", separator, part)));
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

/// Greedily pack small pieces into chunks, carrying an overlap window forward
fn merge_splits(splits: &[String], config: &ChunkingConfig) -> Vec<String> {
    let mut docs = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for split in splits {
        let len = char_len(split);

        if total + len > config.chunk_size {
            if total > config.chunk_size {
                warn!(
                    "Created a chunk of size {}, which is longer than the specified {}",
                    total, config.chunk_size
                );
            }

            if !current.is_empty() {
                if let Some(doc) = join_pieces(&current) {
                    docs.push(doc);
                }

                while total > config.chunk_overlap
                    || (total + len > config.chunk_size && total > 0)
                {
                    match current.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
        }

        current.push_back(split.as_str());
        total += len;
    }

    if let Some(doc) = join_pieces(&current) {
        docs.push(doc);
    }

    docs
}

fn join_pieces(pieces: &VecDeque<&str>) -> Option<String> {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Length in characters, the unit chunk limits are expressed in
#[inline]
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
