//! Pseudo-relevance feedback.
//!
//! The top documents of an initial ranking are assumed relevant. Every term in their
//! term vectors is scored by how likely the feedback documents make it, weighted by
//! its rarity in the collection and by the score of each document:
//!
//! ```text
//! score(t) = Σ_d  (tf + μ·mle) / (|d| + μ) · ln(1 / mle) · score(d)
//! ```
//!
//! Documents that do not contain a candidate term still contribute their smoothed
//! (tf = 0) share. The best terms form a weighted `#wand` query.

use std::fmt;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{FeedbackParams, OperatorKind};
use crate::query::{DEFAULT_FIELD, QueryNode};
use crate::search::ScoreList;
use crate::store::{DocId, PostingStore};

/// A selected expansion term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionTerm {
    /// The term.
    pub term: String,
    /// Accumulated feedback score, used as the term's weight.
    pub weight: f64,
    /// Number of feedback documents that added to the score.
    pub contributions: usize,
}

/// A weighted expansion query over one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpansionQuery {
    field: String,
    terms: Vec<ExpansionTerm>,
}

impl ExpansionQuery {
    /// The field the terms are searched in.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Terms by descending weight.
    pub fn terms(&self) -> &[ExpansionTerm] {
        &self.terms
    }

    /// Check if no term was selected.
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The expansion as a `#wand` query tree.
    pub fn to_query_node(&self) -> QueryNode {
        QueryNode::weighted(
            OperatorKind::WAnd,
            self.terms
                .iter()
                .map(|term| {
                    (
                        term.weight,
                        QueryNode::term_in(self.field.as_str(), term.term.as_str()),
                    )
                })
                .collect(),
        )
    }

    /// Combine an original query with this expansion:
    /// `#wand( w original (1 - w) expansion )`.
    pub fn combine_with(&self, original: QueryNode, original_weight: f64) -> QueryNode {
        QueryNode::weighted(
            OperatorKind::WAnd,
            vec![
                (original_weight, original),
                (1.0 - original_weight, self.to_query_node()),
            ],
        )
    }
}

/// Renders `#wand ( 0.1234 term ... )` with four-decimal weights.
impl fmt::Display for ExpansionQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("#wand (")?;
        for term in &self.terms {
            if self.field == DEFAULT_FIELD {
                write!(f, " {:.4} {}", term.weight, term.term)?;
            } else {
                write!(f, " {:.4} {}.{}", term.weight, term.term, self.field)?;
            }
        }
        f.write_str(" )")
    }
}

#[derive(Debug)]
struct Candidate {
    mle: f64,
    score: f64,
    documents: AHashSet<DocId>,
    contributions: usize,
}

impl Candidate {
    fn idf(&self) -> f64 {
        (1.0 / self.mle).ln()
    }
}

/// Builds expansion queries from ranked feedback documents.
#[derive(Debug)]
pub struct FeedbackExpander<'a> {
    store: &'a dyn PostingStore,
    params: &'a FeedbackParams,
}

impl<'a> FeedbackExpander<'a> {
    /// Create an expander.
    pub fn new(store: &'a dyn PostingStore, params: &'a FeedbackParams) -> Self {
        FeedbackExpander { store, params }
    }

    /// Expand from an initial ranking.
    ///
    /// Only the `fb_docs` best documents of the ranking are used; the ranking
    /// itself is left untouched.
    pub fn expand(&self, ranking: &ScoreList) -> Result<ExpansionQuery> {
        let field = self.params.fb_field.as_str();
        let mu = self.params.fb_mu;

        let mut top = ranking.clone();
        top.sort();
        top.truncate(self.params.fb_docs);

        let collection_length = self.store.sum_field_lengths(field)? as f64;
        let mut candidates: AHashMap<String, Candidate> = AHashMap::new();
        let mut documents = Vec::with_capacity(top.len());

        for entry in &top {
            let doc_length = self.store.field_length(field, entry.doc_id)? as f64;
            documents.push((entry.doc_id, entry.score, doc_length));

            let vector = self.store.term_vector(entry.doc_id, field)?;
            for stats in vector.iter() {
                if stats.term.contains('.') || stats.term.contains(',') || stats.ctf == 0 {
                    continue;
                }

                let candidate = candidates
                    .entry(stats.term.clone())
                    .or_insert_with(|| Candidate {
                        mle: stats.ctf as f64 / collection_length,
                        score: 0.0,
                        documents: AHashSet::new(),
                        contributions: 0,
                    });
                let ptd = (stats.tf as f64 + mu * candidate.mle) / (doc_length + mu);
                candidate.score += ptd * candidate.idf() * entry.score;
                candidate.documents.insert(entry.doc_id);
                candidate.contributions += 1;
            }
        }

        for (doc_id, doc_score, doc_length) in &documents {
            for candidate in candidates.values_mut() {
                if candidate.documents.contains(doc_id) {
                    continue;
                }
                let ptd = mu * candidate.mle / (doc_length + mu);
                candidate.score += ptd * candidate.idf() * doc_score;
                candidate.contributions += 1;
            }
        }

        let mut terms: Vec<ExpansionTerm> = candidates
            .into_iter()
            .map(|(term, candidate)| ExpansionTerm {
                term,
                weight: candidate.score,
                contributions: candidate.contributions,
            })
            .collect();
        terms.sort_by(|a, b| b.weight.total_cmp(&a.weight).then_with(|| a.term.cmp(&b.term)));
        terms.truncate(self.params.fb_terms);

        log::debug!(
            "Selected {} expansion terms from {} feedback documents",
            terms.len(),
            documents.len()
        );

        Ok(ExpansionQuery {
            field: field.to_string(),
            terms,
        })
    }
}
