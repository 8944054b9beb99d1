//! Per-document ranking features.
//!
//! For a query and a document, each of the fields `body`, `title`, `url` and
//! `inlink` contributes three features computed from the document's term vector:
//!
//! | feature | body | title | url | inlink |
//! |---------|------|-------|-----|--------|
//! | BM25    | 1    | 4     | 7   | 10     |
//! | Indri   | 2    | 5     | 8   | 11     |
//! | overlap | 3    | 6     | 9   | 12     |
//!
//! A field the document does not have yields `None` for its three features; such
//! features are left out of the rendered line rather than written as 0.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::model::Bm25Params;
use crate::store::{DocId, PostingStore, TermVector};

/// Fields features are computed for, in feature order.
pub const FEATURE_FIELDS: [&str; 4] = ["body", "title", "url", "inlink"];

/// Number of features per document.
pub const FEATURE_COUNT: usize = FEATURE_FIELDS.len() * 3;

/// The features of one (query, document) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Query id.
    pub qid: String,
    /// External id of the document.
    pub external_id: String,
    /// Relevance label (0 when unknown).
    pub relevance: i32,
    /// Feature values; index 0 is feature 1.
    pub values: Vec<Option<f64>>,
}

impl FeatureVector {
    /// Render as an SVMrank line: `rel qid:X 1:v 2:v ... # external-id`.
    pub fn to_svmrank_line(&self) -> String {
        let mut parts = vec![self.relevance.to_string(), format!("qid:{}", self.qid)];
        parts.extend(
            self.values
                .iter()
                .enumerate()
                .filter_map(|(index, value)| value.map(|value| format!("{}:{value}", index + 1))),
        );
        parts.push(format!("# {}", self.external_id));
        parts.join(" ")
    }
}

/// Computes feature vectors from term vectors.
#[derive(Debug)]
pub struct FeatureExtractor<'a> {
    store: &'a dyn PostingStore,
    bm25: Bm25Params,
    mu: f64,
    lambda: f64,
    disabled: AHashSet<usize>,
}

impl<'a> FeatureExtractor<'a> {
    /// Create an extractor with BM25 and Indri parameters.
    pub fn new(store: &'a dyn PostingStore, bm25: Bm25Params, mu: f64, lambda: f64) -> Self {
        FeatureExtractor {
            store,
            bm25,
            mu,
            lambda,
            disabled: AHashSet::new(),
        }
    }

    /// Disable features by their 1-based number, given as a comma-separated list
    /// such as `"3,6,9"`.
    pub fn with_disabled(mut self, disabled: &str) -> Result<Self> {
        for item in disabled.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let feature: usize = item.parse().map_err(|_| {
                PilumError::configuration(format!("Invalid feature number {item}"))
            })?;
            if !(1..=FEATURE_COUNT).contains(&feature) {
                return Err(PilumError::configuration(format!(
                    "Feature {feature} is out of range 1..={FEATURE_COUNT}"
                )));
            }
            self.disabled.insert(feature);
        }
        Ok(self)
    }

    /// Compute the features of one document for the given query terms.
    pub fn extract(&self, terms: &[&str], doc_id: DocId) -> Result<Vec<Option<f64>>> {
        let mut values = Vec::with_capacity(FEATURE_COUNT);
        for field in FEATURE_FIELDS {
            let vector = self.store.term_vector(doc_id, field)?;
            if vector.is_empty() {
                values.extend([None, None, None]);
                continue;
            }
            let doc_length = self.store.field_length(field, doc_id)? as f64;
            values.push(Some(self.bm25(&vector, terms, field, doc_length)?));
            values.push(Some(self.indri(&vector, terms, field, doc_length)?));
            values.push(Some(overlap(&vector, terms)));
        }

        for feature in &self.disabled {
            values[feature - 1] = None;
        }
        Ok(values)
    }

    /// Build the feature vector of a document.
    pub fn feature_vector(
        &self,
        qid: &str,
        terms: &[&str],
        doc_id: DocId,
        relevance: i32,
    ) -> Result<FeatureVector> {
        Ok(FeatureVector {
            qid: qid.to_string(),
            external_id: self.store.external_id(doc_id)?,
            relevance,
            values: self.extract(terms, doc_id)?,
        })
    }

    fn bm25(
        &self,
        vector: &TermVector,
        terms: &[&str],
        field: &str,
        doc_length: f64,
    ) -> Result<f64> {
        let num_docs = self.store.num_docs()? as f64;
        let avg_length = self.store.avg_field_length(field)?;
        let Bm25Params { k1, b, k3 } = self.bm25;

        let mut score = 0.0;
        for entry in terms.iter().filter_map(|term| vector.get(term)) {
            let df = entry.df as f64;
            let tf = entry.tf as f64;
            let idf = ((num_docs - df + 0.5) / (df + 0.5)).ln().max(0.0);
            let tf_weight = tf / (tf + k1 * ((1.0 - b) + b * doc_length / avg_length));
            score += idf * tf_weight * (k3 + 1.0) / (k3 + 1.0);
        }
        Ok(score)
    }

    fn indri(
        &self,
        vector: &TermVector,
        terms: &[&str],
        field: &str,
        doc_length: f64,
    ) -> Result<f64> {
        if terms.is_empty() || !terms.iter().any(|term| vector.get(term).is_some()) {
            return Ok(0.0);
        }

        let collection_length = (self.store.sum_field_lengths(field)? as f64).max(1.0);
        let exponent = 1.0 / terms.len() as f64;
        let mut score = 1.0;
        for term in terms {
            let (tf, ctf) = match vector.get(term) {
                Some(entry) => (entry.tf as f64, entry.ctf as f64),
                None => (0.0, self.store.total_term_freq(field, term)? as f64),
            };
            let mle = (if ctf == 0.0 { 0.5 } else { ctf }) / collection_length;
            let term_score = (1.0 - self.lambda) * (tf + self.mu * mle) / (doc_length + self.mu)
                + self.lambda * mle;
            score *= term_score.powf(exponent);
        }
        Ok(score)
    }
}

fn overlap(vector: &TermVector, terms: &[&str]) -> f64 {
    if terms.is_empty() {
        return 0.0;
    }
    let matched = terms.iter().filter(|term| vector.get(term).is_some()).count();
    matched as f64 / terms.len() as f64
}
