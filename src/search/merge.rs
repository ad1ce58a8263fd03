use std::collections::HashMap;

use crate::models::{DocumentId, RankedDoc};

/// Turn accumulated scores into hits ordered by score, then ascending ID
pub fn rank_scores(scores: HashMap<DocumentId, u32>) -> Vec<RankedDoc> {
    let mut ranked: Vec<RankedDoc> = scores
        .into_iter()
        .map(|(doc_id, score)| RankedDoc::new(doc_id, score))
        .collect();
    ranked.sort_unstable_by(|a, b| b.score.cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
    ranked
}

/// Merge per-segment results, summing the scores of a document found in
/// more than one of them
pub fn merge_results<I>(parts: I) -> Vec<RankedDoc>
where
    I: IntoIterator<Item = Vec<RankedDoc>>,
{
    let mut scores: HashMap<DocumentId, u32> = HashMap::new();
    for part in parts {
        for hit in part {
            *scores.entry(hit.doc_id).or_insert(0) += hit.score;
        }
    }
    rank_scores(scores)
}

pub fn apply_limit(mut hits: Vec<RankedDoc>, limit: Option<usize>) -> Vec<RankedDoc> {
    if let Some(limit) = limit {
        hits.truncate(limit);
    }
    hits
}
