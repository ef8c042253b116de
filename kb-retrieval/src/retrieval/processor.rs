//! Post-processing of raw index hits
//!
//! Fixed pipeline: filter, score and sort, truncate to `top_k`, then drop
//! duplicate texts. Deduplication runs after truncation and never backfills,
//! so a request can legitimately return fewer than `top_k` passages.

use crate::index::{metadata_matches, RawHit};
use crate::retrieval::request::{Passage, RetrievalRequest, SortStrategy};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Turns raw hits into the ranked passage list for a request
///
/// Never fails. Hits without text or score (or with a NaN score) are
/// dropped silently.
#[derive(Debug, Default)]
pub struct ResultProcessor {
    processed_batches: AtomicU64,
}

impl ResultProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of hit batches processed so far
    pub fn processed_batches(&self) -> u64 {
        self.processed_batches.load(Ordering::Relaxed)
    }

    pub fn process(&self, hits: Vec<RawHit>, request: &RetrievalRequest) -> Vec<Passage> {
        self.processed_batches.fetch_add(1, Ordering::Relaxed);

        let received = hits.len();
        if request.top_k == 0 || hits.is_empty() {
            return Vec::new();
        }

        let mut passages: Vec<Passage> = hits
            .into_iter()
            .filter_map(to_passage)
            .filter(|p| p.score >= request.min_score)
            .filter(|p| {
                request
                    .filter
                    .as_ref()
                    .map_or(true, |f| metadata_matches(&p.metadata, f))
            })
            .collect();

        match request.sort {
            SortStrategy::ByScore => {
                passages.sort_by(|a, b| a.score.total_cmp(&b.score));
            }
            SortStrategy::ByRelevance => {
                for passage in &mut passages {
                    passage.relevance =
                        Some(relevance_score(passage.score, &passage.text, &request.query));
                }
                // Stable sort: equal relevance keeps index order
                passages.sort_by(|a, b| {
                    let a = a.relevance.unwrap_or(a.score);
                    let b = b.relevance.unwrap_or(b.score);
                    a.total_cmp(&b)
                });
            }
        }

        passages.truncate(request.top_k);

        let mut seen = HashSet::new();
        passages.retain(|p| seen.insert(p.text.clone()));

        debug!(
            "Processed {} raw hits into {} passages (top_k: {}, sort: {})",
            received,
            passages.len(),
            request.top_k,
            request.sort
        );
        passages
    }
}

fn to_passage(hit: RawHit) -> Option<Passage> {
    let text = hit.text?;
    let score = hit.score.filter(|s| !s.is_nan())?;
    let source = hit
        .metadata
        .get("source")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    Some(Passage {
        chunk_id: hit.chunk_id,
        text,
        source,
        metadata: hit.metadata,
        score,
        relevance: None,
    })
}

/// Weighted distance used by [`SortStrategy::ByRelevance`]; lower is better
///
/// `score * (1 + chars/1000) * (1 + miss_ratio)`, where `miss_ratio` is the
/// share of whitespace-separated query keywords missing from the text
/// (case-insensitive), or 0 for a query without keywords.
pub fn relevance_score(score: f64, text: &str, query: &str) -> f64 {
    let length_factor = 1.0 + text.chars().count() as f64 / 1000.0;

    let keywords: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();
    let miss_ratio = if keywords.is_empty() {
        0.0
    } else {
        let lowered = text.to_lowercase();
        let found = keywords.iter().filter(|k| lowered.contains(k.as_str())).count();
        1.0 - found as f64 / keywords.len() as f64
    };

    score * length_factor * (1.0 + miss_ratio)
}
