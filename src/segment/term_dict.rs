//! In-memory term dictionary of one segment
//!
//! Maps each `(field, token)` term to the per-document occurrence counts of
//! that term. The dictionary is the full inverted index of a segment; it is
//! shipped verbatim inside Raft snapshots.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::{DocumentId, Term, TermData};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermDictionary {
    dict: HashMap<Term, TermData>,
}

impl TermDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a term and return its per-document frequencies
    pub fn get(&self, term: &Term) -> Option<&TermData> {
        self.dict.get(term)
    }

    /// Check if a term exists
    pub fn contains(&self, term: &Term) -> bool {
        self.dict.contains_key(term)
    }

    /// Add `count` occurrences of `term` for `doc_id`
    pub fn increment(&mut self, term: Term, doc_id: DocumentId, count: u32) {
        *self.dict.entry(term).or_default().entry(doc_id).or_insert(0) += count;
    }

    /// Get the number of terms
    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    /// Iterate over all terms in the dictionary
    pub fn iter(&self) -> impl Iterator<Item = (&Term, &TermData)> {
        self.dict.iter()
    }

    /// Number of documents in this dictionary containing `term`
    pub fn doc_frequency(&self, term: &Term) -> usize {
        self.dict.get(term).map(|td| td.len()).unwrap_or(0)
    }
}
