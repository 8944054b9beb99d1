//! Ranked lists of scored documents.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::store::DocId;

/// A document and its score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredDoc {
    /// Internal document id.
    pub doc_id: DocId,
    /// Score under the run's retrieval model.
    pub score: f64,
}

/// The scores of one query.
///
/// Entries are appended in document order while a query is evaluated;
/// [`ScoreList::sort`] ranks them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreList {
    entries: Vec<ScoredDoc>,
}

impl ScoreList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a document score.
    pub fn add(&mut self, doc_id: DocId, score: f64) {
        self.entries.push(ScoredDoc { doc_id, score });
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry at `index`.
    pub fn get(&self, index: usize) -> Option<&ScoredDoc> {
        self.entries.get(index)
    }

    /// Iterate over the entries in their current order.
    pub fn iter(&self) -> impl Iterator<Item = &ScoredDoc> {
        self.entries.iter()
    }

    /// The score of a document, if the list holds it.
    pub fn score_of(&self, doc_id: DocId) -> Option<f64> {
        self.entries
            .iter()
            .find(|entry| entry.doc_id == doc_id)
            .map(|entry| entry.score)
    }

    /// Rank by score descending, ties by ascending document id.
    pub fn sort(&mut self) {
        self.entries.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
    }

    /// Keep only the first `len` entries.
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    /// Whether the list is in ranked order.
    pub fn is_sorted(&self) -> bool {
        self.entries.windows(2).all(|pair| {
            match pair[1].score.total_cmp(&pair[0].score) {
                Ordering::Less => true,
                Ordering::Equal => pair[0].doc_id < pair[1].doc_id,
                Ordering::Greater => false,
            }
        })
    }
}

impl FromIterator<(DocId, f64)> for ScoreList {
    fn from_iter<I: IntoIterator<Item = (DocId, f64)>>(iter: I) -> Self {
        ScoreList {
            entries: iter
                .into_iter()
                .map(|(doc_id, score)| ScoredDoc { doc_id, score })
                .collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ScoreList {
    type Item = &'a ScoredDoc;
    type IntoIter = std::slice::Iter<'a, ScoredDoc>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
