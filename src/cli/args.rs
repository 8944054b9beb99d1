//! Command line argument parsing for the Pilum CLI.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::error::Result;
use crate::model::RetrievalModel;

/// Pilum: structured query evaluation over inverted indexes.
#[derive(Parser, Debug, Clone)]
#[command(name = "pilum")]
#[command(about = "Structured query evaluation, retrieval models and pseudo-relevance feedback")]
#[command(version = crate::VERSION)]
pub struct PilumArgs {
    /// Verbose output (can be used multiple times for increased verbosity)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-essential output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "human", global = true)]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable format
    Human,
    /// JSON format
    Json,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Evaluate a query file and write a TREC run, as described by a parameter file
    Run(RunArgs),

    /// Evaluate a single query against an index
    Query(QueryArgs),

    /// Print SVMrank feature vectors for the documents a query matches
    Features(FeaturesArgs),
}

/// Arguments for batch runs.
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Parameter file (`.json` or `key=value` lines)
    #[arg(value_name = "PARAM_FILE")]
    pub param_file: PathBuf,
}

/// Retrieval models selectable on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModelArg {
    UnrankedBoolean,
    RankedBoolean,
    Bm25,
    Indri,
}

/// Model parameters shared by the single-query commands.
#[derive(Parser, Debug, Clone)]
pub struct ModelOptions {
    /// BM25 term frequency saturation
    #[arg(long, default_value = "1.2")]
    pub k1: f64,

    /// BM25 length normalization
    #[arg(long, default_value = "0.75")]
    pub b: f64,

    /// BM25 query term frequency saturation
    #[arg(long, default_value = "0")]
    pub k3: f64,

    /// Indri Dirichlet prior
    #[arg(long, default_value = "2500")]
    pub mu: f64,

    /// Indri mixing weight
    #[arg(long, default_value = "0.4")]
    pub lambda: f64,
}

impl ModelOptions {
    /// Build the retrieval model, checking parameter ranges.
    pub fn build(&self, model: ModelArg) -> Result<RetrievalModel> {
        match model {
            ModelArg::UnrankedBoolean => Ok(RetrievalModel::UnrankedBoolean),
            ModelArg::RankedBoolean => Ok(RetrievalModel::RankedBoolean),
            ModelArg::Bm25 => RetrievalModel::bm25(self.k1, self.b, self.k3),
            ModelArg::Indri => RetrievalModel::indri(self.mu, self.lambda),
        }
    }
}

/// Arguments for single queries.
#[derive(Parser, Debug, Clone)]
pub struct QueryArgs {
    /// Index file (JSON corpus)
    #[arg(short, long, value_name = "INDEX", env = "PILUM_INDEX")]
    pub index: PathBuf,

    /// Retrieval model
    #[arg(short, long, value_enum, default_value = "bm25")]
    pub model: ModelArg,

    #[command(flatten)]
    pub options: ModelOptions,

    /// Maximum number of results
    #[arg(short, long, default_value = "10")]
    pub limit: usize,

    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: String,
}

/// Arguments for feature extraction.
#[derive(Parser, Debug, Clone)]
pub struct FeaturesArgs {
    /// Index file (JSON corpus)
    #[arg(short, long, value_name = "INDEX", env = "PILUM_INDEX")]
    pub index: PathBuf,

    /// Query id written into each line
    #[arg(long, default_value = "0")]
    pub qid: String,

    /// External ids of the documents to describe (defaults to every matching document)
    #[arg(short, long, value_delimiter = ',')]
    pub doc: Vec<String>,

    /// Comma-separated feature numbers to leave out
    #[arg(long, default_value = "")]
    pub disable: String,

    #[command(flatten)]
    pub options: ModelOptions,

    /// Maximum number of documents
    #[arg(short, long, default_value = "100")]
    pub limit: usize,

    /// Query text
    #[arg(value_name = "QUERY")]
    pub query: String,
}

impl PilumArgs {
    /// Get the verbosity level (0 = quiet, 1 = normal, 2+ = verbose).
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n.saturating_add(1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run() {
        let args = PilumArgs::try_parse_from(["pilum", "run", "params.json"]).unwrap();
        match &args.command {
            Command::Run(run) => assert_eq!(run.param_file, PathBuf::from("params.json")),
            other => panic!("unexpected command {other:?}"),
        }
        assert_eq!(args.verbosity(), 1);
    }

    #[test]
    fn test_parse_query_with_model_options() {
        let args = PilumArgs::try_parse_from([
            "pilum", "-vv", "query", "--index", "corpus.json", "--model", "indri", "--mu",
            "1000", "#and(apple pie)",
        ])
        .unwrap();
        assert_eq!(args.verbosity(), 3);

        let Command::Query(query) = args.command else {
            panic!("expected the query command");
        };
        assert_eq!(query.model, ModelArg::Indri);
        assert_eq!(query.query, "#and(apple pie)");
        assert_eq!(
            query.options.build(query.model).unwrap(),
            RetrievalModel::indri(1000.0, 0.4).unwrap()
        );
    }

    #[test]
    fn test_invalid_model_options() {
        let args = PilumArgs::try_parse_from([
            "pilum", "query", "--index", "c.json", "--b", "2", "apple",
        ])
        .unwrap();
        let Command::Query(query) = args.command else {
            panic!("expected the query command");
        };
        assert!(query.options.build(query.model).unwrap_err().is_configuration());
    }

    #[test]
    fn test_quiet_mode() {
        let args = PilumArgs::try_parse_from([
            "pilum", "-q", "features", "--index", "c.json", "--doc", "a,b", "apple",
        ])
        .unwrap();
        assert_eq!(args.verbosity(), 0);
        let Command::Features(features) = args.command else {
            panic!("expected the features command");
        };
        assert_eq!(features.doc, vec!["a".to_string(), "b".to_string()]);
    }
}
