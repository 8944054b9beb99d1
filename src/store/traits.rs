//! The posting store contract consumed by query evaluation.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::store::posting::{DocId, InvertedList};

/// Read-only access to a pre-built inverted index.
///
/// Query evaluation only ever reads from the store, so implementations are shared
/// by reference for the duration of a run.
pub trait PostingStore: Debug {
    /// Total number of documents in the corpus.
    fn num_docs(&self) -> Result<u64>;

    /// Number of documents that contain the field.
    fn doc_count(&self, field: &str) -> Result<u64>;

    /// Sum of the lengths of every instance of the field in the corpus.
    fn sum_field_lengths(&self, field: &str) -> Result<u64>;

    /// Length of the field in one document (0 if the document lacks the field).
    fn field_length(&self, field: &str, doc_id: DocId) -> Result<u64>;

    /// Collection term frequency of a term in a field.
    fn total_term_freq(&self, field: &str, term: &str) -> Result<u64>;

    /// Number of documents whose field contains the term.
    fn document_frequency(&self, field: &str, term: &str) -> Result<u64>;

    /// The inverted list of a term in a field (empty if the term is unknown).
    fn postings(&self, field: &str, term: &str) -> Result<InvertedList>;

    /// The term vector of one document field.
    fn term_vector(&self, doc_id: DocId, field: &str) -> Result<TermVector>;

    /// Resolve an external document id.
    ///
    /// Fails with a lookup error when the id is unknown or shared by several
    /// documents.
    fn internal_id(&self, external_id: &str) -> Result<DocId>;

    /// The external id of a document.
    fn external_id(&self, doc_id: DocId) -> Result<String>;

    /// Average field length, or 0 when no document has the field.
    fn avg_field_length(&self, field: &str) -> Result<f64> {
        let doc_count = self.doc_count(field)?;
        if doc_count == 0 {
            return Ok(0.0);
        }
        Ok(self.sum_field_lengths(field)? as f64 / doc_count as f64)
    }
}

/// Statistics of one term inside a term vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermVectorEntry {
    /// The term.
    pub term: String,
    /// Frequency in this document field.
    pub tf: u64,
    /// Collection term frequency in the field.
    pub ctf: u64,
    /// Document frequency in the field.
    pub df: u64,
}

/// The terms of one document field with their statistics, ordered by term.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermVector {
    entries: Vec<TermVectorEntry>,
}

impl TermVector {
    /// Create a term vector, ordering entries by term.
    pub fn new(mut entries: Vec<TermVectorEntry>) -> Self {
        entries.sort_by(|a, b| a.term.cmp(&b.term));
        TermVector { entries }
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the vector has no terms.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries in term order.
    pub fn iter(&self) -> impl Iterator<Item = &TermVectorEntry> {
        self.entries.iter()
    }

    /// Look up one term.
    pub fn get(&self, term: &str) -> Option<&TermVectorEntry> {
        self.entries
            .binary_search_by(|entry| entry.term.as_str().cmp(term))
            .ok()
            .map(|index| &self.entries[index])
    }

    /// Field length implied by the vector (sum of tf).
    pub fn length(&self) -> u64 {
        self.entries.iter().map(|entry| entry.tf).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(term: &str, tf: u64) -> TermVectorEntry {
        TermVectorEntry {
            term: term.to_string(),
            tf,
            ctf: tf * 10,
            df: 3,
        }
    }

    #[test]
    fn test_term_vector_lookup() {
        let vector = TermVector::new(vec![entry("pie", 2), entry("apple", 1), entry("crust", 4)]);

        assert_eq!(vector.len(), 3);
        assert_eq!(vector.length(), 7);
        assert_eq!(vector.get("crust").unwrap().tf, 4);
        assert!(vector.get("banana").is_none());

        let terms: Vec<&str> = vector.iter().map(|e| e.term.as_str()).collect();
        assert_eq!(terms, vec!["apple", "crust", "pie"]);
    }
}
