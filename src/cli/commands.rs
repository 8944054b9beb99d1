//! Command implementations for the Pilum CLI.

use std::time::Instant;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::EvalConfig;
use crate::error::Result;
use crate::features::FeatureExtractor;
use crate::model::Bm25Params;
use crate::run::run_config;
use crate::search::QueryEvaluator;
use crate::store::{MemoryStore, PostingStore};

/// Execute a CLI command.
pub fn execute_command(args: PilumArgs) -> Result<()> {
    match &args.command {
        Command::Run(run_args) => run_batch(run_args.clone(), &args),
        Command::Query(query_args) => run_query(query_args.clone(), &args),
        Command::Features(features_args) => extract_features(features_args.clone(), &args),
    }
}

/// Evaluate a query file as described by a parameter file.
fn run_batch(args: RunArgs, cli_args: &PilumArgs) -> Result<()> {
    let start = Instant::now();
    let config = EvalConfig::load(&args.param_file)?;
    config.validate()?;

    let store = MemoryStore::from_json_file(&config.index_path)?;
    log::info!(
        "Loaded {} documents from {}",
        store.len(),
        config.index_path.display()
    );
    let summary = run_config(&store, &config)?;

    let report = RunReport {
        output_path: config.trec_eval_output_path.clone(),
        summary,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    output_result("Batch run completed", &report, cli_args)
}

/// Evaluate a single query.
fn run_query(args: QueryArgs, cli_args: &PilumArgs) -> Result<()> {
    let start = Instant::now();
    let store = MemoryStore::from_json_file(&args.index)?;
    let model = args.options.build(args.model)?;

    let evaluator = QueryEvaluator::new(&store, &model);
    let query = evaluator.parse(&args.query)?;
    let mut results = evaluator.evaluate(&query)?;
    let total_hits = results.len();
    results.sort();
    results.truncate(args.limit);

    let hits = results
        .iter()
        .enumerate()
        .map(|(rank, entry)| {
            Ok(Hit {
                rank: rank + 1,
                external_id: store.external_id(entry.doc_id)?,
                score: entry.score,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let report = QueryResults {
        query: query.to_string(),
        model: model.name().to_string(),
        hits,
        total_hits,
        duration_ms: start.elapsed().as_millis() as u64,
    };
    output_result("Query evaluated", &report, cli_args)
}

/// Print SVMrank feature lines for a query.
fn extract_features(args: FeaturesArgs, cli_args: &PilumArgs) -> Result<()> {
    let store = MemoryStore::from_json_file(&args.index)?;
    let bm25 = Bm25Params {
        k1: args.options.k1,
        b: args.options.b,
        k3: args.options.k3,
    };
    let model = args.options.build(ModelArg::Bm25)?;

    let evaluator = QueryEvaluator::new(&store, &model);
    let query = evaluator.parse(&args.query)?;
    let terms: Vec<&str> = query.terms().into_iter().map(|(_, term)| term).collect();

    let documents = if args.doc.is_empty() {
        let mut results = evaluator.evaluate(&query)?;
        results.sort();
        results.truncate(args.limit);
        results.iter().map(|entry| entry.doc_id).collect()
    } else {
        args.doc
            .iter()
            .take(args.limit)
            .map(|external_id| store.internal_id(external_id))
            .collect::<Result<Vec<_>>>()?
    };

    let extractor = FeatureExtractor::new(&store, bm25, args.options.mu, args.options.lambda)
        .with_disabled(&args.disable)?;
    let lines = documents
        .into_iter()
        .map(|doc_id| {
            extractor
                .feature_vector(&args.qid, &terms, doc_id, 0)
                .map(|vector| vector.to_svmrank_line())
        })
        .collect::<Result<Vec<_>>>()?;

    output_result("Features extracted", &FeatureReport { lines }, cli_args)
}
