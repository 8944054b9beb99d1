//! Output formatting for CLI commands.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, PilumArgs};
use crate::error::Result;
use crate::run::RunSummary;

/// One ranked document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub rank: usize,
    pub external_id: String,
    pub score: f64,
}

/// Result structure for single queries.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResults {
    pub query: String,
    pub model: String,
    pub hits: Vec<Hit>,
    pub total_hits: usize,
    pub duration_ms: u64,
}

/// Result structure for batch runs.
#[derive(Debug, Serialize, Deserialize)]
pub struct RunReport {
    pub output_path: PathBuf,
    #[serde(flatten)]
    pub summary: RunSummary,
    pub duration_ms: u64,
}

/// Result structure for feature extraction.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureReport {
    pub lines: Vec<String>,
}

/// Rendering of a result for people rather than programs.
pub trait HumanOutput {
    fn print_human(&self);
}

impl HumanOutput for QueryResults {
    fn print_human(&self) {
        println!("Query ({}): {}", self.model, self.query);
        println!("═══════════════");
        for hit in &self.hits {
            println!("{:>4}  {:<24} {:.6}", hit.rank, hit.external_id, hit.score);
        }
        println!();
        println!("Total hits: {}", self.total_hits);
        println!("Search time: {}ms", self.duration_ms);
    }
}

impl HumanOutput for RunReport {
    fn print_human(&self) {
        println!("Run written to {}", self.output_path.display());
        println!("Queries: {}", self.summary.queries);
        println!("Failed: {}", self.summary.failed);
        println!("Rows: {}", self.summary.rows);
        println!("Run time: {}ms", self.duration_ms);
    }
}

impl HumanOutput for FeatureReport {
    fn print_human(&self) {
        for line in &self.lines {
            println!("{line}");
        }
    }
}

/// Output a result in the specified format.
pub fn output_result<T>(message: &str, result: &T, args: &PilumArgs) -> Result<()>
where
    T: Serialize + HumanOutput,
{
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

fn output_human<T: HumanOutput>(message: &str, result: &T, args: &PilumArgs) -> Result<()> {
    if args.verbosity() > 1 {
        println!("{message}");
        println!();
    }
    result.print_human();
    Ok(())
}

fn output_json<T: Serialize>(result: &T, args: &PilumArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_report_json_is_flat() {
        let report = RunReport {
            output_path: PathBuf::from("out.teIn"),
            summary: RunSummary {
                queries: 3,
                failed: 1,
                rows: 12,
            },
            duration_ms: 5,
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["queries"], 3);
        assert_eq!(value["failed"], 1);
        assert_eq!(value["rows"], 12);
        assert_eq!(value["output_path"], "out.teIn");
    }
}
