//! Segmented in-memory inverted index
//!
//! # Architecture
//!
//! - `Segment`: term dictionary plus document/byte counters
//! - `ActiveSegment`: the one segment of an index accepting writes
//! - `Index`: active segment plus sealed segments, swapped atomically on refresh

mod active;
mod index;
#[allow(clippy::module_inception)]
mod segment;
mod term_dict;

pub use active::ActiveSegment;
pub use index::{segment_name, Index, IndexParts, SegmentLayout, FIRST_DOC_ID};
pub use segment::Segment;
pub use term_dict::TermDictionary;

use crate::error::Result;
use crate::models::{RankedDoc, Term};

/// A segment that can answer a full-text query
pub trait Searchable: Send + Sync {
    fn segment_name(&self) -> String;

    fn search_full_text(&self, terms: &[Term]) -> Result<Vec<RankedDoc>>;
}
