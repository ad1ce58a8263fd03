use parking_lot::{RwLock, RwLockReadGuard};

use super::segment::Segment;
use super::Searchable;
use crate::error::{QuarryError, Result};
use crate::models::{Document, RankedDoc, Term};
use crate::tokenizer::Tokenizer;

/// The single segment of an index that accepts writes.
///
/// Searches may run concurrently with additions; each search sees the
/// segment either before or after a given document was added.
#[derive(Debug)]
pub struct ActiveSegment {
    segment: RwLock<Segment>,
    tokenizer: Tokenizer,
}

impl ActiveSegment {
    pub fn new(name: impl Into<String>, index_name: impl Into<String>, tokenizer: Tokenizer) -> Self {
        Self::from_segment(Segment::new(name, index_name), tokenizer)
    }

    pub fn from_segment(segment: Segment, tokenizer: Tokenizer) -> Self {
        Self {
            segment: RwLock::new(segment),
            tokenizer,
        }
    }

    /// Index a document; returns the segment's document count afterwards
    pub fn add_document(&self, doc: &Document) -> Result<usize> {
        if doc.fields.is_empty() {
            return Err(QuarryError::EmptyDocument);
        }
        Ok(self.segment.write().index_document(doc, &self.tokenizer))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Segment> {
        self.segment.read()
    }

    /// Copy of the current contents, used when sealing and snapshotting
    pub fn to_segment(&self) -> Segment {
        self.segment.read().clone()
    }

    pub fn doc_count(&self) -> usize {
        self.segment.read().doc_count()
    }

    pub fn name(&self) -> String {
        self.segment.read().name().to_string()
    }
}

impl Searchable for ActiveSegment {
    fn segment_name(&self) -> String {
        self.name()
    }

    fn search_full_text(&self, terms: &[Term]) -> Result<Vec<RankedDoc>> {
        self.segment.read().search_full_text(terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: u64, body: serde_json::Value) -> Document {
        let mut doc = Document::from_map(body.as_object().unwrap().clone()).unwrap();
        doc.id = id;
        doc
    }

    #[test]
    fn test_add_document_counts() {
        let active = ActiveSegment::new("books-000000", "books", Tokenizer::new(false));
        assert_eq!(active.add_document(&doc(1, json!({"title": "a b"}))).unwrap(), 1);
        assert_eq!(active.add_document(&doc(2, json!({"title": "b c"}))).unwrap(), 2);
        assert_eq!(active.doc_count(), 2);

        let hits = active
            .search_full_text(&[Term::new("title", "b")])
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_empty_document_rejected() {
        let active = ActiveSegment::new("books-000000", "books", Tokenizer::new(false));
        let err = active.add_document(&doc(1, json!({}))).unwrap_err();
        assert!(matches!(err, QuarryError::EmptyDocument));
        assert_eq!(active.doc_count(), 0);
    }

    #[test]
    fn test_sealed_copy_is_detached() {
        let active = ActiveSegment::new("books-000000", "books", Tokenizer::new(false));
        active.add_document(&doc(1, json!({"title": "x"}))).unwrap();
        let copy = active.to_segment();
        active.add_document(&doc(2, json!({"title": "x"}))).unwrap();
        assert_eq!(copy.doc_count(), 1);
        assert_eq!(active.doc_count(), 2);
    }
}
