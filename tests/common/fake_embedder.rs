//! Deterministic stand-in for Ollama's `/api/embed`, included by both the
//! integration tests and the crate's own unit tests.

use serde_json::json;
use wiremock::{Request, Respond, ResponseTemplate};

pub const DIMENSION: usize = 8;

/// Answers `/api/embed` with one bag-of-words vector per input
pub struct FakeEmbedder;

impl Respond for FakeEmbedder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap_or_default();
        let embeddings: Vec<Vec<f32>> = body["input"]
            .as_array()
            .map(|inputs| {
                inputs
                    .iter()
                    .map(|text| bag_of_words(text.as_str().unwrap_or_default()))
                    .collect()
            })
            .unwrap_or_default();
        ResponseTemplate::new(200).set_body_json(json!({ "embeddings": embeddings }))
    }
}

/// Word counts hashed into `DIMENSION` slots, ignoring case and punctuation
pub fn bag_of_words(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0; DIMENSION];
    for word in text.split_whitespace() {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        let slot = word
            .bytes()
            .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
            % DIMENSION;
        vector[slot] += 1.0;
    }
    vector
}
