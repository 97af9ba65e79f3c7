use criterion::{Criterion, criterion_group, criterion_main};
use news_research::embeddings::chunking::{ChunkingConfig, split_text};
use std::hint::black_box;

const PARAGRAPH: &str = "Acme Corp posted record profits this quarter while analysts revised \
their forecasts upward and suppliers expanded capacity across three regions to keep up with \
demand.\n\n";

/// Roughly the size of a long news story
fn article_text() -> String {
    PARAGRAPH.repeat(200)
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let text = article_text();
    let config = ChunkingConfig::default();
    c.bench_function("chunking", |b| {
        b.iter(|| split_text(black_box(&text), black_box(&config)))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
