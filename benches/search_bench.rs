use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::json;

use quarry::models::Document;
use quarry::segment::Index;

const WORDS: [&str; 8] = [
    "rust", "search", "segment", "raft", "index", "token", "query", "merge",
];

fn build_index(doc_count: usize, capacity: usize) -> Index {
    let index = Index::new("bench", false, capacity);
    for i in 0..doc_count {
        let title = format!(
            "{} {} {} doc{}",
            WORDS[i % WORDS.len()],
            WORDS[(i / 3) % WORDS.len()],
            WORDS[(i / 7) % WORDS.len()],
            i
        );
        let body = json!({ "title": title, "n": i });
        let doc = Document::from_map(body.as_object().unwrap().clone()).unwrap();
        index.add_document(doc).unwrap();
    }
    index
}

fn bench_full_text_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_text_search");
    for &count in &[1_000usize, 10_000, 50_000] {
        let index = build_index(count, 1_000);
        let terms = index.terms_for("title", "rust segment merge");
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| black_box(index.search_full_text(black_box(&terms), 4)))
        });
    }
    group.finish();
}

fn bench_search_workers(c: &mut Criterion) {
    let index = build_index(20_000, 500);
    let terms = index.terms_for("title", "raft index query");

    let mut group = c.benchmark_group("search_workers");
    for &workers in &[1usize, 2, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, &w| {
            b.iter(|| black_box(index.search_full_text(&terms, w)))
        });
    }
    group.finish();
}

fn bench_add_document(c: &mut Criterion) {
    c.bench_function("add_document", |b| {
        let index = Index::new("bench", false, 1_000);
        let mut i = 0u64;
        b.iter(|| {
            i += 1;
            let body = json!({ "title": format!("rust search doc{}", i) });
            let doc = Document::from_map(body.as_object().unwrap().clone()).unwrap();
            black_box(index.add_document(doc).unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_full_text_search,
    bench_search_workers,
    bench_add_document
);
criterion_main!(benches);
