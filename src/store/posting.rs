//! Postings and inverted lists.
//!
//! Both leaf term lists (read from a [`PostingStore`](super::PostingStore)) and the
//! synthetic lists produced by proximity operators use these types, so a parent
//! operator cannot tell them apart.

use serde::{Deserialize, Serialize};

use crate::error::{PilumError, Result};

/// Internal document identifier.
pub type DocId = u32;

/// A document's record within an inverted list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// The document ID.
    pub doc_id: DocId,
    /// Term positions, strictly increasing.
    pub positions: Vec<u32>,
}

impl Posting {
    /// Create a posting, checking that positions are strictly increasing.
    pub fn new(doc_id: DocId, positions: Vec<u32>) -> Result<Self> {
        if positions.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(PilumError::store(format!(
                "positions for document {doc_id} are not strictly increasing"
            )));
        }
        Ok(Posting { doc_id, positions })
    }

    /// Term frequency in this document.
    pub fn tf(&self) -> u32 {
        self.positions.len() as u32
    }
}

/// An ordered-by-docid sequence of postings for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvertedList {
    /// Field the list belongs to.
    field: String,
    /// Postings in strictly increasing document order.
    postings: Vec<Posting>,
    /// Collection term frequency (sum of tf over all postings).
    ctf: u64,
}

impl InvertedList {
    /// Create an empty inverted list for a field.
    pub fn new<S: Into<String>>(field: S) -> Self {
        InvertedList {
            field: field.into(),
            postings: Vec::new(),
            ctf: 0,
        }
    }

    /// Append a posting for a document after every document already in the list.
    ///
    /// Empty position lists are ignored: a document without occurrences is not a
    /// posting.
    pub fn append_posting(&mut self, doc_id: DocId, positions: Vec<u32>) -> Result<()> {
        if positions.is_empty() {
            return Ok(());
        }
        if let Some(last) = self.postings.last()
            && last.doc_id >= doc_id
        {
            return Err(PilumError::store(format!(
                "document {doc_id} appended after document {} in the {} list",
                last.doc_id, self.field
            )));
        }

        let posting = Posting::new(doc_id, positions)?;
        self.ctf += u64::from(posting.tf());
        self.postings.push(posting);
        Ok(())
    }

    /// The field this list belongs to.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Document frequency: the number of postings.
    pub fn df(&self) -> u64 {
        self.postings.len() as u64
    }

    /// Collection term frequency.
    pub fn ctf(&self) -> u64 {
        self.ctf
    }

    /// Number of postings.
    pub fn len(&self) -> usize {
        self.postings.len()
    }

    /// Check if the list has no postings.
    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    /// Get the posting at an index.
    pub fn get(&self, index: usize) -> Option<&Posting> {
        self.postings.get(index)
    }

    /// All postings in document order.
    pub fn postings(&self) -> &[Posting] {
        &self.postings
    }

    /// Document ids in list order.
    pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.postings.iter().map(|posting| posting.doc_id)
    }
}
