use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::term_dict::TermDictionary;
use super::Searchable;
use crate::error::{QuarryError, Result};
use crate::models::{Document, DocumentId, RankedDoc, Term};
use crate::search::rank_scores;
use crate::tokenizer::Tokenizer;

/// One partition of an index's term-frequency data.
///
/// A segment only changes while it is wrapped by the index's
/// [`ActiveSegment`](super::ActiveSegment); once sealed it is shared behind an
/// `Arc` and read without locking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    name: String,
    index_name: String,
    term_dict: TermDictionary,
    doc_count: usize,
    byte_size: usize,
}

impl Segment {
    pub fn new(name: impl Into<String>, index_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index_name: index_name.into(),
            term_dict: TermDictionary::new(),
            doc_count: 0,
            byte_size: 0,
        }
    }

    /// Rebuild a segment from snapshot data
    pub fn from_parts(
        name: String,
        index_name: String,
        term_dict: TermDictionary,
        doc_count: usize,
        byte_size: usize,
    ) -> Self {
        Self {
            name,
            index_name,
            term_dict,
            doc_count,
            byte_size,
        }
    }

    /// Add a document's terms; returns the new in-segment document count
    pub(crate) fn index_document(&mut self, doc: &Document, tokenizer: &Tokenizer) -> usize {
        for (term, count) in tokenizer.compute_term_frequencies(&doc.fields) {
            self.term_dict.increment(term, doc.id, count);
        }
        self.doc_count += 1;
        self.byte_size += doc.byte_len;
        self.doc_count
    }

    /// Documents containing `term`, highest frequency first
    pub fn search_term(&self, term: &Term) -> Result<Vec<RankedDoc>> {
        let td = self.term_dict.get(term).ok_or(QuarryError::TermNotFound)?;
        let mut res: Vec<RankedDoc> = td
            .iter()
            .map(|(&doc_id, &freq)| RankedDoc::new(doc_id, freq))
            .collect();
        res.sort_by(|a, b| b.score.cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
        Ok(res)
    }

    /// Union of per-term results; scores of documents matching several
    /// terms are summed.
    pub fn search_full_text(&self, terms: &[Term]) -> Result<Vec<RankedDoc>> {
        let mut scores: HashMap<DocumentId, u32> = HashMap::new();
        for term in terms {
            let hits = match self.search_term(term) {
                Ok(hits) => hits,
                Err(QuarryError::TermNotFound) => continue,
                Err(e) => return Err(e),
            };
            for hit in hits {
                *scores.entry(hit.doc_id).or_insert(0) += hit.score;
            }
        }
        Ok(rank_scores(scores))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn term_dict(&self) -> &TermDictionary {
        &self.term_dict
    }

    pub fn doc_count(&self) -> usize {
        self.doc_count
    }

    pub fn byte_size(&self) -> usize {
        self.byte_size
    }

    pub fn term_count(&self) -> usize {
        self.term_dict.len()
    }
}

impl Searchable for Segment {
    fn segment_name(&self) -> String {
        self.name.clone()
    }

    fn search_full_text(&self, terms: &[Term]) -> Result<Vec<RankedDoc>> {
        Segment::search_full_text(self, terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Field;

    fn doc(id: DocumentId, title: &str) -> Document {
        let mut doc = Document::from_map(Default::default()).unwrap();
        doc.id = id;
        doc.add_field(Field::string("title", title));
        doc.byte_len = title.len();
        doc
    }

    #[test]
    fn test_search_term_keeps_ids_paired_with_frequencies() {
        let tokenizer = Tokenizer::new(false);
        let mut seg = Segment::new("books-000000", "books");
        seg.index_document(&doc(1, "rust"), &tokenizer);
        seg.index_document(&doc(2, "rust rust rust"), &tokenizer);
        seg.index_document(&doc(3, "rust rust"), &tokenizer);

        let res = seg.search_term(&Term::new("title", "rust")).unwrap();
        assert_eq!(
            res,
            vec![
                RankedDoc::new(2, 3),
                RankedDoc::new(3, 2),
                RankedDoc::new(1, 1)
            ]
        );
    }

    #[test]
    fn test_search_term_missing() {
        let seg = Segment::new("books-000000", "books");
        let err = seg.search_term(&Term::new("title", "nope")).unwrap_err();
        assert!(matches!(err, QuarryError::TermNotFound));
    }

    #[test]
    fn test_full_text_sums_across_terms() {
        let tokenizer = Tokenizer::new(false);
        let mut seg = Segment::new("books-000000", "books");
        seg.index_document(&doc(1, "rise of the beast"), &tokenizer);
        seg.index_document(&doc(2, "the the end"), &tokenizer);

        let res = seg
            .search_full_text(&[
                Term::new("title", "the"),
                Term::new("title", "beast"),
                Term::new("title", "absent"),
            ])
            .unwrap();
        // doc 1: the(1) + beast(1); doc 2: the(2); tie broken by id
        assert_eq!(res, vec![RankedDoc::new(1, 2), RankedDoc::new(2, 2)]);
        assert_eq!(seg.doc_count(), 2);
        assert_eq!(seg.byte_size(), "rise of the beast".len() + "the the end".len());
    }
}
