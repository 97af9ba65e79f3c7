use super::*;
use crate::llm::ChatRole;

const ACME: &str = "https://news.example.com/acme";
const WEATHER: &str = "https://news.example.com/weather";

fn chunk(source: &str, content: &str) -> ChunkMetadata {
    ChunkMetadata {
        source: source.to_string(),
        content: content.to_string(),
        chunk_index: 0,
        char_count: content.chars().count() as u32,
        created_at: "2024-01-01T00:00:00Z".to_string(),
    }
}

fn retrieved() -> Vec<String> {
    vec![ACME.to_string(), WEATHER.to_string()]
}

#[test]
fn messages_contain_question_and_sourced_chunks() {
    let messages = build_messages(
        "  What did Acme Corp report? ",
        &[
            chunk(ACME, "Acme Corp posted record profits this quarter."),
            chunk(WEATHER, "Rain is expected tomorrow."),
        ],
    );

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, ChatRole::System);
    assert!(messages[0].content.contains("SOURCES:"));

    let user = &messages[1];
    assert_eq!(user.role, ChatRole::User);
    assert!(user.content.starts_with("QUESTION: What did Acme Corp report?\n"));
    assert!(user.content.contains(
        "Content: Acme Corp posted record profits this quarter.\nSource: https://news.example.com/acme\n"
    ));
    assert!(user.content.contains("Source: https://news.example.com/weather"));
    assert!(user.content.ends_with("FINAL ANSWER:"));
}

#[test]
fn answer_and_sources_are_split_at_marker() {
    let parsed = parse_answer(
        "Acme Corp reported record profits.\nSOURCES: https://news.example.com/acme",
        &retrieved(),
    )
    .expect("parse should succeed");

    assert_eq!(parsed.answer, "Acme Corp reported record profits.");
    assert_eq!(parsed.sources, vec![ACME]);
}

#[test]
fn marker_is_case_insensitive_and_singular_allowed() {
    let parsed = parse_answer("Profits rose.\nSource: https://news.example.com/acme", &retrieved())
        .expect("parse should succeed");

    assert_eq!(parsed.answer, "Profits rose.");
    assert_eq!(parsed.sources, vec![ACME]);
}

#[test]
fn listed_sources_are_cleaned_and_deduplicated() {
    let completion = "Profits rose while rain is coming.\n\n**Sources:**\n\
- [https://news.example.com/acme](https://news.example.com/acme)\n\
- <https://news.example.com/weather/>, https://news.example.com/acme.\n";

    let parsed = parse_answer(completion, &retrieved()).expect("parse should succeed");

    assert_eq!(parsed.answer, "Profits rose while rain is coming.");
    assert_eq!(parsed.sources, vec![ACME, WEATHER]);
}

#[test]
fn unretrieved_sources_are_dropped() {
    let parsed = parse_answer(
        "Profits rose.\nSOURCES: https://elsewhere.example.org/, https://news.example.com/acme",
        &retrieved(),
    )
    .expect("parse should succeed");

    assert_eq!(parsed.sources, vec![ACME]);
}

#[test]
fn completion_without_marker_has_no_sources() {
    let parsed = parse_answer("I don't know.", &retrieved()).expect("parse should succeed");

    assert_eq!(parsed.answer, "I don't know.");
    assert!(parsed.sources.is_empty());
}

#[test]
fn word_ending_in_sources_is_not_a_marker() {
    let parsed = parse_answer("Acme cited resources: cash reserves.", &retrieved())
        .expect("parse should succeed");

    assert_eq!(parsed.answer, "Acme cited resources: cash reserves.");
}

#[test]
fn empty_answer_is_an_error() {
    assert!(parse_answer("SOURCES: https://news.example.com/acme", &retrieved()).is_err());
    assert!(parse_answer("   ", &retrieved()).is_err());
}

#[test]
fn parentheses_and_commas_inside_urls_are_kept() {
    let wiki = "https://en.wikipedia.org/wiki/Acme_(company)";
    let slug = "https://news.example.com/acme,profits-soar";
    let retrieved = vec![wiki.to_string(), slug.to_string()];

    let completion = format!(
        "Acme Corp reported record profits.\nSOURCES: {}, {}\n\
         See also [the company]({}).",
        wiki, slug, wiki
    );
    let parsed = parse_answer(&completion, &retrieved).expect("parse should succeed");

    assert_eq!(parsed.sources, vec![wiki, slug]);
}

#[test]
fn longer_source_wins_over_its_prefix() {
    let retrieved = vec![
        "https://news.example.com/acme".to_string(),
        "https://news.example.com/acme,update".to_string(),
    ];

    let parsed = parse_answer(
        "Profits rose.\nSOURCES: https://news.example.com/acme,update",
        &retrieved,
    )
    .expect("parse should succeed");

    assert_eq!(parsed.sources, vec!["https://news.example.com/acme,update"]);
}

#[test]
fn source_embedded_in_a_longer_url_is_not_cited() {
    let parsed = parse_answer(
        "Profits rose.\nSOURCES: https://news.example.com/acme-follow-up",
        &retrieved(),
    )
    .expect("parse should succeed");

    assert!(parsed.sources.is_empty());
}
