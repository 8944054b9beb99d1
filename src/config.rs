//! Run configuration.
//!
//! A run is described by a parameter file. Two layouts are accepted: the classic
//! `key=value` format (one parameter per line) and a JSON object using the same
//! keys:
//!
//! ```text
//! indexPath=corpus.json
//! queryFilePath=queries.txt
//! trecEvalOutputPath=run.teIn
//! retrievalAlgorithm=Indri
//! Indri:mu=2500
//! Indri:lambda=0.4
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::model::{FeedbackParams, RetrievalModel};
use crate::query::DEFAULT_FIELD;

fn default_output_length() -> usize {
    100
}

fn default_run_id() -> String {
    "run-1".to_string()
}

fn default_fb_field() -> String {
    DEFAULT_FIELD.to_string()
}

/// Parameters of one evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvalConfig {
    /// Location of the index (a JSON corpus for the in-memory store).
    pub index_path: PathBuf,
    /// File of `qid:query` lines.
    pub query_file_path: PathBuf,
    /// TREC run file written by the run.
    pub trec_eval_output_path: PathBuf,
    /// Maximum number of results written per query.
    #[serde(default = "default_output_length")]
    pub trec_eval_output_length: usize,
    /// Run tag written in the last column of the TREC output.
    #[serde(default = "default_run_id")]
    pub run_id: String,
    /// `unrankedboolean`, `rankedboolean`, `bm25` or `indri` (case-insensitive).
    pub retrieval_algorithm: String,
    /// BM25 k1.
    #[serde(rename = "BM25:k_1", default)]
    pub bm25_k1: Option<f64>,
    /// BM25 b.
    #[serde(rename = "BM25:b", default)]
    pub bm25_b: Option<f64>,
    /// BM25 k3.
    #[serde(rename = "BM25:k_3", default)]
    pub bm25_k3: Option<f64>,
    /// Indri mu.
    #[serde(rename = "Indri:mu", default)]
    pub indri_mu: Option<f64>,
    /// Indri lambda.
    #[serde(rename = "Indri:lambda", default)]
    pub indri_lambda: Option<f64>,
    /// Enable query expansion.
    #[serde(default)]
    pub fb: bool,
    #[serde(default)]
    pub fb_docs: Option<usize>,
    #[serde(default)]
    pub fb_terms: Option<usize>,
    #[serde(default)]
    pub fb_mu: Option<f64>,
    #[serde(default)]
    pub fb_orig_weight: Option<f64>,
    #[serde(default)]
    pub fb_initial_ranking_file: Option<PathBuf>,
    #[serde(default)]
    pub fb_expansion_query_file: Option<PathBuf>,
    /// Field expansion terms are mined from.
    #[serde(default = "default_fb_field")]
    pub fb_field: String,
}

impl EvalConfig {
    /// Load a parameter file; `.json` files are read as JSON, anything else as
    /// `key=value` lines.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            PilumError::configuration(format!("Can't read {}: {e}", path.display()))
        })?;

        let config = if path.extension().is_some_and(|ext| ext == "json") {
            Self::from_json_str(&content)?
        } else {
            Self::from_parameter_str(&content)?
        };
        log::info!(
            "Loaded parameters from {} ({} model)",
            path.display(),
            config.retrieval_algorithm
        );
        Ok(config)
    }

    /// Parse a JSON parameter object.
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: EvalConfig = serde_json::from_str(content)
            .map_err(|e| PilumError::configuration(format!("Malformed parameters: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse `key=value` lines. Blank lines are ignored.
    pub fn from_parameter_str(content: &str) -> Result<Self> {
        let mut parameters = BTreeMap::new();
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                PilumError::configuration(format!(
                    "Malformed parameter on line {}: {line}",
                    number + 1
                ))
            })?;
            parameters.insert(key.trim().to_string(), value.trim().to_string());
        }
        Self::from_parameters(&parameters)
    }

    /// Build a configuration from a parameter map.
    pub fn from_parameters(parameters: &BTreeMap<String, String>) -> Result<Self> {
        let config = EvalConfig {
            index_path: required(parameters, "indexPath")?.into(),
            query_file_path: required(parameters, "queryFilePath")?.into(),
            trec_eval_output_path: required(parameters, "trecEvalOutputPath")?.into(),
            trec_eval_output_length: optional(parameters, "trecEvalOutputLength")?
                .unwrap_or_else(default_output_length),
            run_id: parameters
                .get("runId")
                .cloned()
                .unwrap_or_else(default_run_id),
            retrieval_algorithm: required(parameters, "retrievalAlgorithm")?.to_string(),
            bm25_k1: optional(parameters, "BM25:k_1")?,
            bm25_b: optional(parameters, "BM25:b")?,
            bm25_k3: optional(parameters, "BM25:k_3")?,
            indri_mu: optional(parameters, "Indri:mu")?,
            indri_lambda: optional(parameters, "Indri:lambda")?,
            fb: optional(parameters, "fb")?.unwrap_or(false),
            fb_docs: optional(parameters, "fbDocs")?,
            fb_terms: optional(parameters, "fbTerms")?,
            fb_mu: optional(parameters, "fbMu")?,
            fb_orig_weight: optional(parameters, "fbOrigWeight")?,
            fb_initial_ranking_file: parameters.get("fbInitialRankingFile").map(PathBuf::from),
            fb_expansion_query_file: parameters.get("fbExpansionQueryFile").map(PathBuf::from),
            fb_field: parameters
                .get("fbField")
                .cloned()
                .unwrap_or_else(default_fb_field),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that the parameters describe a runnable configuration.
    pub fn validate(&self) -> Result<()> {
        RetrievalModel::from_config(self).map(|_| ())
    }

    /// Feedback parameters, when expansion is enabled.
    pub fn feedback_params(&self) -> Result<Option<FeedbackParams>> {
        if !self.fb {
            return Ok(None);
        }

        let params = FeedbackParams {
            fb_docs: require_value(self.fb_docs, "fbDocs")?,
            fb_terms: require_value(self.fb_terms, "fbTerms")?,
            fb_mu: require_value(self.fb_mu, "fbMu")?,
            fb_orig_weight: require_value(self.fb_orig_weight, "fbOrigWeight")?,
            fb_initial_ranking_file: self.fb_initial_ranking_file.clone(),
            fb_expansion_query_file: self
                .fb_expansion_query_file
                .clone()
                .ok_or_else(|| missing("fbExpansionQueryFile"))?,
            fb_field: self.fb_field.clone(),
        };
        params.validate()?;
        Ok(Some(params))
    }
}

impl RetrievalModel {
    /// Build the retrieval model a configuration names.
    pub fn from_config(config: &EvalConfig) -> Result<Self> {
        let model = match config.retrieval_algorithm.to_lowercase().as_str() {
            "unrankedboolean" => RetrievalModel::UnrankedBoolean,
            "rankedboolean" => RetrievalModel::RankedBoolean,
            "bm25" => RetrievalModel::bm25(
                require_value(config.bm25_k1, "BM25:k_1")?,
                require_value(config.bm25_b, "BM25:b")?,
                require_value(config.bm25_k3, "BM25:k_3")?,
            )?,
            "indri" => RetrievalModel::indri(
                require_value(config.indri_mu, "Indri:mu")?,
                require_value(config.indri_lambda, "Indri:lambda")?,
            )?,
            other => {
                return Err(PilumError::configuration(format!(
                    "Unknown retrieval model {other}"
                )));
            }
        };

        match config.feedback_params()? {
            Some(feedback) => model.with_feedback(feedback),
            None => Ok(model),
        }
    }
}

fn missing(key: &str) -> PilumError {
    PilumError::configuration(format!("Required parameter {key} is missing"))
}

fn require_value<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| missing(key))
}

fn required<'a>(parameters: &'a BTreeMap<String, String>, key: &str) -> Result<&'a str> {
    parameters
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| missing(key))
}

fn optional<T: FromStr>(parameters: &BTreeMap<String, String>, key: &str) -> Result<Option<T>> {
    parameters
        .get(key)
        .map(|value| {
            value.parse::<T>().map_err(|_| {
                PilumError::configuration(format!("Invalid value for {key}: {value}"))
            })
        })
        .transpose()
}
