use std::sync::Arc;
use std::thread;

use crossbeam::channel;
use tracing::{trace, warn};

use super::merge::merge_results;
use crate::models::{RankedDoc, Term};
use crate::segment::Searchable;

/// Run `terms` against every target on at most `workers` threads and merge
/// the partial results.
///
/// Returns once every segment has been searched. A segment that fails is
/// logged and left out of the result.
pub fn search_segments(
    targets: Vec<Arc<dyn Searchable>>,
    terms: &[Term],
    workers: usize,
) -> Vec<RankedDoc> {
    if targets.is_empty() || terms.is_empty() {
        return Vec::new();
    }
    let workers = workers.clamp(1, targets.len());

    let (job_tx, job_rx) = channel::unbounded::<Arc<dyn Searchable>>();
    for target in targets {
        let _ = job_tx.send(target);
    }
    drop(job_tx);

    let (result_tx, result_rx) = channel::unbounded::<(String, Vec<RankedDoc>)>();
    thread::scope(|s| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            s.spawn(move || {
                for segment in job_rx.iter() {
                    let name = segment.segment_name();
                    match segment.search_full_text(terms) {
                        Ok(hits) => {
                            if result_tx.send((name, hits)).is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(segment = %name, error = %e, "Segment search failed"),
                    }
                }
            });
        }
    });
    drop(result_tx);

    merge_results(result_rx.iter().map(|(name, hits)| {
        trace!(segment = %name, hits = hits.len(), "Segment searched");
        hits
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{QuarryError, Result};
    use crate::segment::Index;
    use serde_json::json;

    struct Broken;

    impl Searchable for Broken {
        fn segment_name(&self) -> String {
            "broken".to_string()
        }

        fn search_full_text(&self, _terms: &[Term]) -> Result<Vec<RankedDoc>> {
            Err(QuarryError::Internal("boom".into()))
        }
    }

    fn filled_index(capacity: usize, titles: &[&str]) -> Index {
        let index = Index::new("books", false, capacity);
        for title in titles {
            let body = json!({ "title": title });
            let doc = crate::models::Document::from_map(body.as_object().unwrap().clone()).unwrap();
            index.add_document(doc).unwrap();
        }
        index
    }

    #[test]
    fn test_results_do_not_depend_on_worker_count() {
        let index = filled_index(2, &["a b", "b c", "c a", "a a", "b", "c c c"]);
        let terms = index.terms_for("title", "a c");
        let one = index.search_full_text(&terms, 1);
        for workers in [2, 3, 8] {
            assert_eq!(index.search_full_text(&terms, workers), one);
        }
        assert_eq!(one[0], RankedDoc::new(6, 3));
    }

    #[test]
    fn test_failing_segment_is_dropped() {
        let index = filled_index(10, &["rust"]);
        let mut targets = index.layout().targets();
        targets.push(Arc::new(Broken));
        let hits = search_segments(targets, &index.terms_for("title", "rust"), 4);
        assert_eq!(hits, vec![RankedDoc::new(1, 1)]);
    }

    #[test]
    fn test_empty_query() {
        let index = filled_index(10, &["rust"]);
        assert!(index.search_full_text(&[], 4).is_empty());
    }
}
