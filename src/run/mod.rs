//! Batch runs: query files in, TREC run files out.

pub mod batch;
pub mod trec;

pub use self::batch::{BatchRunner, RunSummary, parse_query_line, run_config};
pub use self::trec::{InitialRanking, TrecWriter, read_initial_ranking};
