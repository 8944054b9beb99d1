//! Retrieval models.
//!
//! A retrieval model is selected once per run. It carries the numeric parameters of
//! its scoring formulas and decides which score operators it can evaluate; the
//! operator × model table lives in [`RetrievalModel::supports`] and is checked when
//! a query is compiled, before any document is scored.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};

/// BM25 parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term frequency saturation.
    pub k1: f64,
    /// Field length normalization.
    pub b: f64,
    /// Query term frequency saturation.
    pub k3: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Bm25Params {
            k1: 1.2,
            b: 0.75,
            k3: 0.0,
        }
    }
}

/// Pseudo-relevance feedback parameters for the Indri model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackParams {
    /// Number of top documents mined for expansion terms.
    pub fb_docs: usize,
    /// Number of expansion terms kept.
    pub fb_terms: usize,
    /// Dirichlet prior used when scoring candidate terms.
    pub fb_mu: f64,
    /// Weight of the original query in the combined query.
    pub fb_orig_weight: f64,
    /// Optional TREC-format file holding the initial rankings.
    pub fb_initial_ranking_file: Option<PathBuf>,
    /// File the expansion queries are appended to.
    pub fb_expansion_query_file: PathBuf,
    /// Field term vectors are read from.
    pub fb_field: String,
}

impl FeedbackParams {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.fb_docs == 0 {
            return Err(PilumError::configuration("fbDocs must be at least 1"));
        }
        if self.fb_terms == 0 {
            return Err(PilumError::configuration("fbTerms must be at least 1"));
        }
        if !(self.fb_mu >= 0.0) {
            return Err(PilumError::configuration("fbMu must be non-negative"));
        }
        if !(0.0..=1.0).contains(&self.fb_orig_weight) {
            return Err(PilumError::configuration(
                "fbOrigWeight must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Indri (Dirichlet + Jelinek-Mercer) parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndriParams {
    /// Dirichlet prior.
    pub mu: f64,
    /// Background interpolation weight.
    pub lambda: f64,
    /// Query expansion settings, when feedback is enabled.
    pub feedback: Option<FeedbackParams>,
}

/// Score operators known to the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    /// Leaf scorer over one term or proximity list.
    Score,
    /// Conjunction.
    And,
    /// Disjunction.
    Or,
    /// Sum of child scores.
    Sum,
    /// Weighted conjunction (weighted geometric mean).
    WAnd,
    /// Weighted sum (weighted arithmetic mean).
    WSum,
}

impl OperatorKind {
    /// Operator name used in error messages and query text.
    pub fn name(&self) -> &'static str {
        match self {
            OperatorKind::Score => "SCORE",
            OperatorKind::And => "AND",
            OperatorKind::Or => "OR",
            OperatorKind::Sum => "SUM",
            OperatorKind::WAnd => "WAND",
            OperatorKind::WSum => "WSUM",
        }
    }

    /// Whether the operator takes one weight per argument.
    pub fn is_weighted(&self) -> bool {
        matches!(self, OperatorKind::WAnd | OperatorKind::WSum)
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The retrieval model of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetrievalModel {
    /// Boolean matching, every match scores 1.
    UnrankedBoolean,
    /// Boolean matching scored by term frequency.
    RankedBoolean,
    /// Okapi BM25.
    Bm25(Bm25Params),
    /// Indri query likelihood.
    Indri(IndriParams),
}

impl RetrievalModel {
    /// Create a BM25 model, checking parameter ranges.
    pub fn bm25(k1: f64, b: f64, k3: f64) -> Result<Self> {
        if !(k1 >= 0.0) || !(k3 >= 0.0) {
            return Err(PilumError::configuration(
                "BM25:k_1 and BM25:k_3 must be non-negative",
            ));
        }
        if !(0.0..=1.0).contains(&b) {
            return Err(PilumError::configuration("BM25:b must be between 0 and 1"));
        }
        Ok(RetrievalModel::Bm25(Bm25Params { k1, b, k3 }))
    }

    /// Create an Indri model without feedback, checking parameter ranges.
    pub fn indri(mu: f64, lambda: f64) -> Result<Self> {
        if !(mu >= 0.0) {
            return Err(PilumError::configuration("Indri:mu must be non-negative"));
        }
        if !(0.0..=1.0).contains(&lambda) {
            return Err(PilumError::configuration(
                "Indri:lambda must be between 0 and 1",
            ));
        }
        Ok(RetrievalModel::Indri(IndriParams {
            mu,
            lambda,
            feedback: None,
        }))
    }

    /// Attach feedback settings to an Indri model.
    pub fn with_feedback(self, feedback: FeedbackParams) -> Result<Self> {
        feedback.validate()?;
        match self {
            RetrievalModel::Indri(params) => Ok(RetrievalModel::Indri(IndriParams {
                feedback: Some(feedback),
                ..params
            })),
            other => Err(PilumError::configuration(format!(
                "query expansion requires the Indri model, not {}",
                other.name()
            ))),
        }
    }

    /// Human-readable model name.
    pub fn name(&self) -> &'static str {
        match self {
            RetrievalModel::UnrankedBoolean => "UnrankedBoolean",
            RetrievalModel::RankedBoolean => "RankedBoolean",
            RetrievalModel::Bm25(_) => "BM25",
            RetrievalModel::Indri(_) => "Indri",
        }
    }

    /// The operator wrapped around raw query text.
    pub fn default_operator(&self) -> OperatorKind {
        match self {
            RetrievalModel::UnrankedBoolean | RetrievalModel::RankedBoolean => OperatorKind::Or,
            RetrievalModel::Bm25(_) => OperatorKind::Sum,
            RetrievalModel::Indri(_) => OperatorKind::And,
        }
    }

    /// Whether the model defines a scoring formula for the operator.
    pub fn supports(&self, operator: OperatorKind) -> bool {
        use OperatorKind::*;
        match self {
            RetrievalModel::UnrankedBoolean | RetrievalModel::RankedBoolean => {
                matches!(operator, Score | And | Or)
            }
            RetrievalModel::Bm25(_) => matches!(operator, Score | Sum),
            RetrievalModel::Indri(_) => matches!(operator, Score | And | WAnd | WSum),
        }
    }

    /// Fail with a configuration error if the operator is unsupported.
    pub fn check_supports(&self, operator: OperatorKind) -> Result<()> {
        if self.supports(operator) {
            Ok(())
        } else {
            Err(PilumError::unsupported(operator.name(), self.name()))
        }
    }

    /// Whether the model smooths absent terms with background scores.
    pub fn is_language_model(&self) -> bool {
        matches!(self, RetrievalModel::Indri(_))
    }

    /// Feedback settings, if the model has them.
    pub fn feedback(&self) -> Option<&FeedbackParams> {
        match self {
            RetrievalModel::Indri(params) => params.feedback.as_ref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feedback() -> FeedbackParams {
        FeedbackParams {
            fb_docs: 10,
            fb_terms: 10,
            fb_mu: 0.0,
            fb_orig_weight: 0.5,
            fb_initial_ranking_file: None,
            fb_expansion_query_file: PathBuf::from("expansion.qry"),
            fb_field: "body".to_string(),
        }
    }

    #[test]
    fn test_support_table() {
        let bm25 = RetrievalModel::bm25(1.2, 0.75, 0.0).unwrap();
        assert!(bm25.supports(OperatorKind::Sum));
        assert!(!bm25.supports(OperatorKind::And));
        assert!(bm25.check_supports(OperatorKind::Or).unwrap_err().is_configuration());

        let indri = RetrievalModel::indri(2500.0, 0.4).unwrap();
        assert!(indri.supports(OperatorKind::WAnd));
        assert!(indri.supports(OperatorKind::WSum));
        assert!(!indri.supports(OperatorKind::Or));
        assert!(!indri.supports(OperatorKind::Sum));

        let ranked = RetrievalModel::RankedBoolean;
        assert!(ranked.supports(OperatorKind::Or));
        assert!(!ranked.supports(OperatorKind::WAnd));
    }

    #[test]
    fn test_default_operators() {
        assert_eq!(
            RetrievalModel::UnrankedBoolean.default_operator(),
            OperatorKind::Or
        );
        assert_eq!(
            RetrievalModel::bm25(1.2, 0.75, 0.0).unwrap().default_operator(),
            OperatorKind::Sum
        );
        assert_eq!(
            RetrievalModel::indri(1000.0, 0.5).unwrap().default_operator(),
            OperatorKind::And
        );
    }

    #[test]
    fn test_parameter_validation() {
        assert!(RetrievalModel::bm25(-1.0, 0.75, 0.0).is_err());
        assert!(RetrievalModel::bm25(1.2, 1.5, 0.0).is_err());
        assert!(RetrievalModel::indri(-5.0, 0.5).is_err());
        assert!(RetrievalModel::indri(100.0, 1.1).is_err());
    }

    #[test]
    fn test_feedback_requires_indri() {
        let indri = RetrievalModel::indri(1000.0, 0.7)
            .unwrap()
            .with_feedback(feedback())
            .unwrap();
        assert_eq!(indri.feedback().unwrap().fb_docs, 10);

        let error = RetrievalModel::RankedBoolean
            .with_feedback(feedback())
            .unwrap_err();
        assert!(error.is_configuration());

        let mut bad = feedback();
        bad.fb_orig_weight = 2.0;
        assert!(RetrievalModel::indri(1000.0, 0.7).unwrap().with_feedback(bad).is_err());
    }
}
