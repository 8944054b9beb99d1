//! Criterion benchmarks for Pilum.
//!
//! Covers query parsing, evaluation under each retrieval model, proximity
//! operators and feedback expansion over a generated corpus.

use std::hint::black_box;
use std::path::PathBuf;

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use pilum::feedback::FeedbackExpander;
use pilum::model::FeedbackParams;
use pilum::prelude::*;

/// Generate a store of pseudo-random documents.
fn generate_store(count: usize) -> MemoryStore {
    let words = [
        "search",
        "engine",
        "query",
        "document",
        "field",
        "term",
        "phrase",
        "boolean",
        "relevance",
        "score",
        "retrieval",
        "ranking",
        "feedback",
        "expansion",
        "proximity",
        "window",
    ];

    let mut store = MemoryStore::new();
    for i in 0..count {
        let doc_length = 50 + (i % 100);
        let body: Vec<&str> = (0..doc_length)
            .map(|j| words[(i * 7 + j * 13) % words.len()])
            .collect();
        let title: Vec<&str> = (0..4).map(|j| words[(i + j * 5) % words.len()]).collect();

        store
            .add_document(
                format!("doc-{i}"),
                &[("body", body.join(" ")), ("title", title.join(" "))],
            )
            .unwrap();
    }
    store
}

fn bench_parsing(c: &mut Criterion) {
    let parser = QueryParser::new();
    let query = "#and( #near/3(query expansion) #wsum(0.7 relevance.title 0.3 ranking) #window/8(search engine) )";

    c.bench_function("parse_structured_query", |b| {
        b.iter(|| parser.parse(black_box(query)).unwrap())
    });
}

fn bench_models(c: &mut Criterion) {
    let store = generate_store(2_000);
    let mut group = c.benchmark_group("evaluate");
    group.throughput(Throughput::Elements(store.len() as u64));

    let models = [
        ("ranked_boolean", RetrievalModel::RankedBoolean, "#or(query ranking)"),
        (
            "bm25",
            RetrievalModel::bm25(1.2, 0.75, 0.0).unwrap(),
            "#sum(query ranking feedback)",
        ),
        (
            "indri",
            RetrievalModel::indri(2500.0, 0.4).unwrap(),
            "#and(query ranking feedback)",
        ),
    ];
    for (name, model, query) in &models {
        let evaluator = QueryEvaluator::new(&store, model);
        let query = evaluator.parse(query).unwrap();
        group.bench_function(*name, |b| {
            b.iter(|| evaluator.evaluate(black_box(&query)).unwrap())
        });
    }
    group.finish();
}

fn bench_proximity(c: &mut Criterion) {
    let store = generate_store(2_000);
    let model = RetrievalModel::RankedBoolean;
    let evaluator = QueryEvaluator::new(&store, &model);

    let near = evaluator.parse("#near/2(search engine)").unwrap();
    c.bench_function("near_2", |b| {
        b.iter(|| evaluator.evaluate(black_box(&near)).unwrap())
    });

    let window = evaluator.parse("#window/10(retrieval ranking feedback)").unwrap();
    c.bench_function("window_10", |b| {
        b.iter(|| evaluator.evaluate(black_box(&window)).unwrap())
    });
}

fn bench_feedback(c: &mut Criterion) {
    let store = generate_store(2_000);
    let model = RetrievalModel::indri(2500.0, 0.4).unwrap();
    let mut ranking = QueryEvaluator::new(&store, &model)
        .evaluate_text("retrieval feedback")
        .unwrap();
    ranking.sort();

    let params = FeedbackParams {
        fb_docs: 10,
        fb_terms: 10,
        fb_mu: 0.0,
        fb_orig_weight: 0.5,
        fb_initial_ranking_file: None,
        fb_expansion_query_file: PathBuf::from("expansion.qry"),
        fb_field: "body".to_string(),
    };
    let expander = FeedbackExpander::new(&store, &params);

    c.bench_function("expand_10_docs", |b| {
        b.iter(|| expander.expand(black_box(&ranking)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_parsing,
    bench_models,
    bench_proximity,
    bench_feedback
);
criterion_main!(benches);
