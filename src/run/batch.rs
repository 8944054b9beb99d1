//! Batch evaluation of query files.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::config::EvalConfig;
use crate::error::{PilumError, Result};
use crate::feedback::FeedbackExpander;
use crate::model::RetrievalModel;
use crate::query::QueryParser;
use crate::run::trec::{InitialRanking, TrecWriter, read_initial_ranking};
use crate::search::{QueryEvaluator, ScoreList};
use crate::store::PostingStore;

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Query lines read.
    pub queries: usize,
    /// Queries that failed and produced no rows.
    pub failed: usize,
    /// Result rows written, placeholders included.
    pub rows: usize,
}

/// Split a `qid:query` line.
pub fn parse_query_line(line: &str) -> Result<(&str, &str)> {
    match line.split(':').collect::<Vec<_>>().as_slice() {
        [qid, query] if !qid.trim().is_empty() => Ok((qid.trim(), query.trim())),
        _ => Err(PilumError::parse(format!(
            "Each query line must contain one ':' after a query id, found '{line}'"
        ))),
    }
}

/// Evaluates every query of a query file and writes a TREC run.
#[derive(Debug)]
pub struct BatchRunner<'a> {
    store: &'a dyn PostingStore,
    model: &'a RetrievalModel,
    parser: QueryParser,
    output_length: usize,
    run_id: String,
}

impl<'a> BatchRunner<'a> {
    /// Create a runner writing at most 100 results per query.
    pub fn new(store: &'a dyn PostingStore, model: &'a RetrievalModel) -> Self {
        BatchRunner {
            store,
            model,
            parser: QueryParser::new(),
            output_length: 100,
            run_id: "run-1".to_string(),
        }
    }

    /// Create a runner with the output settings of a configuration.
    pub fn from_config(
        store: &'a dyn PostingStore,
        model: &'a RetrievalModel,
        config: &EvalConfig,
    ) -> Self {
        Self::new(store, model)
            .with_output_length(config.trec_eval_output_length)
            .with_run_id(&config.run_id)
    }

    /// Set the maximum number of results written per query.
    pub fn with_output_length(mut self, output_length: usize) -> Self {
        self.output_length = output_length;
        self
    }

    /// Set the run tag.
    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = run_id.to_string();
        self
    }

    /// Evaluate a query file, writing the run to `output_path`.
    ///
    /// The run file and the expansion query file are truncated first. A query
    /// that fails is logged and skipped, including one whose initial ranking names
    /// an unknown document; failures to read the query file or write the outputs
    /// end the run.
    pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        query_file: P,
        output_path: Q,
    ) -> Result<RunSummary> {
        let start = Instant::now();
        let content = fs::read_to_string(query_file.as_ref())?;
        let mut writer = TrecWriter::create(output_path.as_ref(), &self.run_id)?;

        let feedback = self.model.feedback();
        let expansion_file = feedback.map(|params| params.fb_expansion_query_file.clone());
        if let Some(path) = &expansion_file {
            File::create(path)?;
        }
        let initial_rankings = match feedback.and_then(|p| p.fb_initial_ranking_file.as_ref()) {
            Some(path) => read_initial_ranking(path)?,
            None => AHashMap::new(),
        };

        let mut summary = RunSummary::default();
        for line in content.lines().filter(|line| !line.trim().is_empty()) {
            summary.queries += 1;

            let outcome = parse_query_line(line).and_then(|(qid, text)| {
                log::info!("Query {qid}: {text}");
                let results =
                    self.process_query(qid, text, &initial_rankings, expansion_file.as_deref())?;
                Ok((qid, results))
            });

            match outcome {
                Ok((qid, results)) => {
                    summary.rows += writer.write_results(qid, &results, self.store)?;
                }
                Err(PilumError::Io(error)) => return Err(PilumError::Io(error)),
                Err(error) if error.is_configuration() => {
                    log::warn!("Query rejected ({line}): {error}");
                    summary.failed += 1;
                }
                Err(error) => {
                    log::warn!("Query failed ({line}): {error}");
                    summary.failed += 1;
                }
            }
        }
        writer.flush()?;

        log::info!(
            "Processed {} queries ({} failed, {} rows) in {:?}",
            summary.queries,
            summary.failed,
            summary.rows,
            start.elapsed()
        );
        Ok(summary)
    }

    /// Evaluate one query, expanding it first when feedback is enabled. Returns
    /// the ranked, truncated results.
    pub fn process_query(
        &self,
        qid: &str,
        text: &str,
        initial_rankings: &AHashMap<String, InitialRanking>,
        expansion_file: Option<&Path>,
    ) -> Result<ScoreList> {
        let evaluator =
            QueryEvaluator::new(self.store, self.model).with_parser(self.parser.clone());
        let query = evaluator.parse(text)?;

        let query = match self.model.feedback() {
            Some(params) => {
                let initial = match initial_rankings.get(qid) {
                    Some(ranking) => ranking.resolve(self.store)?,
                    None => {
                        if params.fb_initial_ranking_file.is_some() {
                            log::warn!("No initial ranking for query {qid}, evaluating it instead");
                        }
                        evaluator.evaluate(&query)?
                    }
                };

                let expansion = FeedbackExpander::new(self.store, params).expand(&initial)?;
                if let Some(path) = expansion_file {
                    append_line(path, &format!("{qid}: {expansion}"))?;
                }

                if expansion.is_empty() {
                    log::warn!("No expansion terms for query {qid}, using the original query");
                    query
                } else {
                    let combined = expansion.combine_with(query, params.fb_orig_weight);
                    log::debug!("Combined query {qid}: {combined}");
                    combined
                }
            }
            None => query,
        };

        let mut results = evaluator.evaluate(&query)?;
        results.sort();
        results.truncate(self.output_length);
        Ok(results)
    }
}

fn append_line(path: &Path, line: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    Ok(())
}

/// Run a whole configuration against a store.
pub fn run_config(store: &dyn PostingStore, config: &EvalConfig) -> Result<RunSummary> {
    let model = RetrievalModel::from_config(config)?;
    BatchRunner::from_config(store, &model, config)
        .run(&config.query_file_path, &config.trec_eval_output_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_line() {
        assert_eq!(parse_query_line("10:apple pie").unwrap(), ("10", "apple pie"));
        assert_eq!(
            parse_query_line(" 7 : #near/2(a b) ").unwrap(),
            ("7", "#near/2(a b)")
        );
        assert!(parse_query_line("no separator").is_err());
        assert!(parse_query_line("1:a:b").is_err());
        assert!(parse_query_line(":apple").is_err());
    }
}
