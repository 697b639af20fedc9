use criterion::{criterion_group, criterion_main, Criterion};
use search_core::tokenizer::count_terms;
use search_core::IndexStore;

fn sample_text() -> String {
    let words = ["distributed", "index", "search", "posting", "frequency", "child-like", "worker_pool", "broker"];
    (0..20_000).map(|i| words[i % words.len()]).collect::<Vec<_>>().join(" ")
}

fn bench_count_terms(c: &mut Criterion) {
    let text = sample_text();
    c.bench_function("count_terms_20k", |b| b.iter(|| count_terms(&text)));
}

fn bench_merge(c: &mut Criterion) {
    let counts = count_terms(&sample_text());
    let store = IndexStore::new();
    let doc = store.register_document("/bench/doc.txt");
    c.bench_function("merge_frequencies", |b| b.iter(|| store.merge_frequencies(doc, &counts)));
}

criterion_group!(benches, bench_count_terms, bench_merge);
criterion_main!(benches);
