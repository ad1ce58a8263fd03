//! A named index: one active segment plus any number of sealed segments
//!
//! The arrangement of segments is published through an `ArcSwap`, so a
//! search loads it once and works on a consistent view while writers keep
//! going. All mutations are serialized by the writer lock.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::active::ActiveSegment;
use super::segment::Segment;
use super::Searchable;
use crate::error::{QuarryError, Result};
use crate::models::{Document, DocumentId, RankedDoc, Term};
use crate::search;
use crate::tokenizer::Tokenizer;

/// First identifier handed out by a fresh index
pub const FIRST_DOC_ID: DocumentId = 1;

/// Name of the `counter`-th segment of `index`
pub fn segment_name(index: &str, counter: u64) -> String {
    format!("{}-{:06}", index, counter)
}

/// The segments a search runs against
#[derive(Debug)]
pub struct SegmentLayout {
    pub active: Arc<ActiveSegment>,
    pub sealed: Vec<Arc<Segment>>,
}

impl SegmentLayout {
    /// Every segment, sealed ones first
    pub fn targets(&self) -> Vec<Arc<dyn Searchable>> {
        let mut targets: Vec<Arc<dyn Searchable>> = self
            .sealed
            .iter()
            .map(|s| s.clone() as Arc<dyn Searchable>)
            .collect();
        targets.push(self.active.clone());
        targets
    }

    pub fn doc_count(&self) -> usize {
        self.sealed.iter().map(|s| s.doc_count()).sum::<usize>() + self.active.doc_count()
    }
}

#[derive(Debug)]
struct WriterState {
    next_doc_id: DocumentId,
    segment_counter: u64,
}

/// Plain-data copy of an index, as carried in snapshots
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexParts {
    pub name: String,
    pub case_sensitive: bool,
    pub segment_capacity: usize,
    pub next_doc_id: DocumentId,
    pub segment_counter: u64,
    pub sealed: Vec<Segment>,
    pub active: Segment,
}

#[derive(Debug)]
pub struct Index {
    name: String,
    tokenizer: Tokenizer,
    segment_capacity: usize,
    layout: ArcSwap<SegmentLayout>,
    writer: Mutex<WriterState>,
}

impl Index {
    pub fn new(name: impl Into<String>, case_sensitive: bool, segment_capacity: usize) -> Self {
        let name = name.into();
        let tokenizer = Tokenizer::new(case_sensitive);
        let active = ActiveSegment::new(segment_name(&name, 0), name.clone(), tokenizer);
        Self {
            layout: ArcSwap::from_pointee(SegmentLayout {
                active: Arc::new(active),
                sealed: Vec::new(),
            }),
            writer: Mutex::new(WriterState {
                next_doc_id: FIRST_DOC_ID,
                segment_counter: 0,
            }),
            tokenizer,
            segment_capacity: segment_capacity.max(1),
            name,
        }
    }

    pub fn from_parts(parts: IndexParts) -> Self {
        let tokenizer = Tokenizer::new(parts.case_sensitive);
        Self {
            layout: ArcSwap::from_pointee(SegmentLayout {
                active: Arc::new(ActiveSegment::from_segment(parts.active, tokenizer)),
                sealed: parts.sealed.into_iter().map(Arc::new).collect(),
            }),
            writer: Mutex::new(WriterState {
                next_doc_id: parts.next_doc_id,
                segment_counter: parts.segment_counter,
            }),
            tokenizer,
            segment_capacity: parts.segment_capacity.max(1),
            name: parts.name,
        }
    }

    /// Consistent copy of the whole index
    pub fn to_parts(&self) -> IndexParts {
        let writer = self.writer.lock();
        let layout = self.layout.load_full();
        IndexParts {
            name: self.name.clone(),
            case_sensitive: self.tokenizer.is_case_sensitive(),
            segment_capacity: self.segment_capacity,
            next_doc_id: writer.next_doc_id,
            segment_counter: writer.segment_counter,
            sealed: layout.sealed.iter().map(|s| s.as_ref().clone()).collect(),
            active: layout.active.to_segment(),
        }
    }

    /// Add a document under the next free identifier
    pub fn add_document(&self, doc: Document) -> Result<DocumentId> {
        let mut writer = self.writer.lock();
        let id = writer.next_doc_id;
        self.insert_locked(&mut writer, doc, id)
    }

    /// Add a document under an identifier chosen by the leader.
    ///
    /// Identifiers below the index's next free one are refused; larger ones
    /// move the counter forward so it stays strictly increasing.
    pub fn add_document_with_id(&self, doc: Document, id: DocumentId) -> Result<DocumentId> {
        let mut writer = self.writer.lock();
        if id < writer.next_doc_id {
            return Err(QuarryError::StaleDocumentId {
                doc_id: id,
                next: writer.next_doc_id,
            });
        }
        self.insert_locked(&mut writer, doc, id)
    }

    fn insert_locked(
        &self,
        writer: &mut WriterState,
        mut doc: Document,
        id: DocumentId,
    ) -> Result<DocumentId> {
        doc.id = id;
        if doc.fields.is_empty() {
            return Err(QuarryError::EmptyDocument);
        }
        // A full segment is sealed when the next document arrives, so the
        // newest document always sits in the active segment.
        if self.layout.load().active.doc_count() >= self.segment_capacity {
            self.refresh_locked(writer);
        }
        self.layout.load().active.add_document(&doc)?;
        writer.next_doc_id = id + 1;
        Ok(id)
    }

    /// Seal the active segment and start a new one.
    ///
    /// Returns false when the active segment holds no documents.
    pub fn refresh(&self) -> bool {
        let mut writer = self.writer.lock();
        self.refresh_locked(&mut writer)
    }

    fn refresh_locked(&self, writer: &mut WriterState) -> bool {
        let current = self.layout.load_full();
        if current.active.doc_count() == 0 {
            return false;
        }

        let mut sealed = current.sealed.clone();
        sealed.push(Arc::new(current.active.to_segment()));
        writer.segment_counter += 1;
        let active = ActiveSegment::new(
            segment_name(&self.name, writer.segment_counter),
            self.name.clone(),
            self.tokenizer,
        );

        debug!(
            index = %self.name,
            sealed = sealed.len(),
            active = %active.name(),
            "Refreshed index"
        );
        self.layout.store(Arc::new(SegmentLayout {
            active: Arc::new(active),
            sealed,
        }));
        true
    }

    /// Current arrangement of segments
    pub fn layout(&self) -> Arc<SegmentLayout> {
        self.layout.load_full()
    }

    /// Search every segment with at most `workers` threads.
    ///
    /// Blocks the calling thread; async callers should go through
    /// `spawn_blocking`.
    pub fn search_full_text(&self, terms: &[Term], workers: usize) -> Vec<RankedDoc> {
        let layout = self.layout();
        search::search_segments(layout.targets(), terms, workers)
    }

    /// Tokenize a search phrase with this index's case folding
    pub fn terms_for(&self, field: &str, phrase: &str) -> Vec<Term> {
        self.tokenizer.query_terms(field, phrase)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_case_sensitive(&self) -> bool {
        self.tokenizer.is_case_sensitive()
    }

    pub fn segment_capacity(&self) -> usize {
        self.segment_capacity
    }

    pub fn next_doc_id(&self) -> DocumentId {
        self.writer.lock().next_doc_id
    }

    pub fn segment_counter(&self) -> u64 {
        self.writer.lock().segment_counter
    }

    pub fn sealed_segments(&self) -> Vec<Arc<Segment>> {
        self.layout.load().sealed.clone()
    }

    pub fn active_doc_count(&self) -> usize {
        self.layout.load().active.doc_count()
    }

    pub fn sealed_count(&self) -> usize {
        self.layout.load().sealed.len()
    }

    /// Sealed segments plus the active one
    pub fn segment_count(&self) -> usize {
        self.sealed_count() + 1
    }

    pub fn doc_count(&self) -> usize {
        self.layout.load().doc_count()
    }
}
