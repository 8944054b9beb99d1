//! In-memory posting store for testing and small corpora.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};
use crate::store::posting::{DocId, InvertedList};
use crate::store::traits::{PostingStore, TermVector, TermVectorEntry};

/// A document whose fields are already tokenized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDocument {
    /// External document id.
    pub external_id: String,
    /// Field name to token sequence.
    pub fields: BTreeMap<String, Vec<String>>,
}

/// On-disk JSON layout accepted by [`MemoryStore::from_json_file`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    /// Documents in internal id order.
    pub documents: Vec<StoredDocument>,
}

/// Per-field aggregates.
#[derive(Debug, Default)]
struct FieldData {
    lists: AHashMap<String, InvertedList>,
    lengths: AHashMap<DocId, u64>,
    total_length: u64,
}

/// An in-memory posting store.
///
/// Documents receive internal ids in insertion order. Tokens are taken as given:
/// no analysis is applied.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: Vec<StoredDocument>,
    fields: AHashMap<String, FieldData>,
    external_ids: AHashMap<String, Vec<DocId>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a corpus.
    pub fn from_corpus(corpus: Corpus) -> Result<Self> {
        let mut store = MemoryStore::new();
        for document in corpus.documents {
            store.add_stored_document(document)?;
        }
        Ok(store)
    }

    /// Load a JSON corpus file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let corpus: Corpus = serde_json::from_str(&content)?;
        let store = Self::from_corpus(corpus)?;
        log::info!(
            "Loaded {} documents from {}",
            store.documents.len(),
            path.as_ref().display()
        );
        Ok(store)
    }

    /// Add a document whose fields are whitespace-separated token strings.
    pub fn add_document<E, F, T>(&mut self, external_id: E, fields: &[(F, T)]) -> Result<DocId>
    where
        E: Into<String>,
        F: AsRef<str>,
        T: AsRef<str>,
    {
        let fields = fields
            .iter()
            .map(|(field, text)| {
                let tokens = text.as_ref().split_whitespace().map(str::to_string).collect();
                (field.as_ref().to_string(), tokens)
            })
            .collect();

        self.add_stored_document(StoredDocument {
            external_id: external_id.into(),
            fields,
        })
    }

    /// Add a pre-tokenized document.
    pub fn add_stored_document(&mut self, document: StoredDocument) -> Result<DocId> {
        let doc_id = DocId::try_from(self.documents.len())
            .map_err(|_| PilumError::store("document id space exhausted"))?;

        for (field, tokens) in &document.fields {
            let mut positions: BTreeMap<&str, Vec<u32>> = BTreeMap::new();
            for (position, token) in tokens.iter().enumerate() {
                positions
                    .entry(token.as_str())
                    .or_default()
                    .push(position as u32);
            }

            let data = self.fields.entry(field.clone()).or_default();
            for (term, term_positions) in positions {
                data.lists
                    .entry(term.to_string())
                    .or_insert_with(|| InvertedList::new(field.clone()))
                    .append_posting(doc_id, term_positions)?;
            }
            if !tokens.is_empty() {
                data.lengths.insert(doc_id, tokens.len() as u64);
                data.total_length += tokens.len() as u64;
            }
        }

        self.external_ids
            .entry(document.external_id.clone())
            .or_default()
            .push(doc_id);
        self.documents.push(document);
        Ok(doc_id)
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn document(&self, doc_id: DocId) -> Result<&StoredDocument> {
        self.documents
            .get(doc_id as usize)
            .ok_or_else(|| PilumError::lookup(format!("Internal id {doc_id} not found")))
    }

    fn list(&self, field: &str, term: &str) -> Option<&InvertedList> {
        self.fields.get(field).and_then(|data| data.lists.get(term))
    }
}

impl PostingStore for MemoryStore {
    fn num_docs(&self) -> Result<u64> {
        Ok(self.documents.len() as u64)
    }

    fn doc_count(&self, field: &str) -> Result<u64> {
        Ok(self
            .fields
            .get(field)
            .map(|data| data.lengths.len() as u64)
            .unwrap_or(0))
    }

    fn sum_field_lengths(&self, field: &str) -> Result<u64> {
        Ok(self
            .fields
            .get(field)
            .map(|data| data.total_length)
            .unwrap_or(0))
    }

    fn field_length(&self, field: &str, doc_id: DocId) -> Result<u64> {
        self.document(doc_id)?;
        Ok(self
            .fields
            .get(field)
            .and_then(|data| data.lengths.get(&doc_id).copied())
            .unwrap_or(0))
    }

    fn total_term_freq(&self, field: &str, term: &str) -> Result<u64> {
        Ok(self.list(field, term).map(InvertedList::ctf).unwrap_or(0))
    }

    fn document_frequency(&self, field: &str, term: &str) -> Result<u64> {
        Ok(self.list(field, term).map(InvertedList::df).unwrap_or(0))
    }

    fn postings(&self, field: &str, term: &str) -> Result<InvertedList> {
        Ok(self
            .list(field, term)
            .cloned()
            .unwrap_or_else(|| InvertedList::new(field)))
    }

    fn term_vector(&self, doc_id: DocId, field: &str) -> Result<TermVector> {
        let document = self.document(doc_id)?;
        let Some(tokens) = document.fields.get(field) else {
            return Ok(TermVector::default());
        };

        let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
        for token in tokens {
            *counts.entry(token.as_str()).or_default() += 1;
        }

        let entries = counts
            .into_iter()
            .map(|(term, tf)| {
                let list = self.list(field, term);
                TermVectorEntry {
                    term: term.to_string(),
                    tf,
                    ctf: list.map(InvertedList::ctf).unwrap_or(0),
                    df: list.map(InvertedList::df).unwrap_or(0),
                }
            })
            .collect();
        Ok(TermVector::new(entries))
    }

    fn internal_id(&self, external_id: &str) -> Result<DocId> {
        match self.external_ids.get(external_id).map(Vec::as_slice) {
            Some([doc_id]) => Ok(*doc_id),
            Some([_, _, ..]) => Err(PilumError::lookup(format!(
                "Multiple matches for external id {external_id}"
            ))),
            _ => Err(PilumError::lookup(format!(
                "External id {external_id} not found"
            ))),
        }
    }

    fn external_id(&self, doc_id: DocId) -> Result<String> {
        Ok(self.document(doc_id)?.external_id.clone())
    }
}
