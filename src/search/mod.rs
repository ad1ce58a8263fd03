//! Multi-segment full-text search
//!
//! A query is fanned out to every segment of an index on a bounded pool of
//! scoped threads, partial results are merged by document ID, and the
//! ranked hits are resolved to their bodies from blob storage.

mod fanout;
mod merge;
mod resolve;

pub use fanout::search_segments;
pub use merge::{apply_limit, merge_results, rank_scores};
pub use resolve::resolve_bodies;
