//! Cross-encoder reranking over the merged candidate set. The external
//! service scores each (query, passage) pair against the *original* user
//! query; reformulated variants are a retrieval concern only.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::types::{RankedResult, SearchResult, StageScore};

/// Rerank-service seam. Returns `(candidate index, relevance)` pairs with
/// relevance in [0, 1], at most `top_n` of them, in no guaranteed order.
#[async_trait]
pub trait RerankService: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<(usize, f32)>>;
}

pub struct Reranker {
    service: Arc<dyn RerankService>,
}

impl Reranker {
    pub fn new(service: Arc<dyn RerankService>) -> Self {
        Self { service }
    }

    /// Order candidates by cross-encoder relevance to `query`, descending,
    /// truncated to `top_k`. Ties keep candidate-set order (stable sort).
    ///
    /// On service failure the original candidates are sorted by their own
    /// stage-local score values instead. That comparison mixes score scales
    /// and degrades ranking quality, but it never fails the request.
    pub async fn rerank(
        &self,
        query: &str,
        candidates: Vec<SearchResult>,
        top_k: usize,
    ) -> Vec<RankedResult> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let documents: Vec<String> = candidates.iter().map(|c| c.content.clone()).collect();

        match self.service.rerank(query, &documents, top_k).await {
            Ok(scored) => {
                let mut pairs: Vec<(usize, f32)> = scored
                    .into_iter()
                    .filter(|(idx, _)| {
                        let ok = *idx < candidates.len();
                        if !ok {
                            tracing::warn!(index = *idx, "Rerank service returned out-of-range index");
                        }
                        ok
                    })
                    .map(|(idx, score)| (idx, score.clamp(0.0, 1.0)))
                    .collect();

                // Candidate order first so the stable sort breaks score ties
                // deterministically.
                pairs.sort_by_key(|(idx, _)| *idx);
                pairs.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
                pairs.truncate(top_k);

                pairs
                    .into_iter()
                    .map(|(idx, score)| RankedResult {
                        result: candidates[idx].clone(),
                        score: StageScore::rerank(score),
                    })
                    .collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Reranking failed, falling back to stage-local scores");

                let mut ranked: Vec<RankedResult> = candidates
                    .into_iter()
                    .map(|result| {
                        let score = result.score;
                        RankedResult { result, score }
                    })
                    .collect();
                ranked.sort_by(|a, b| {
                    b.score
                        .value
                        .partial_cmp(&a.score.value)
                        .unwrap_or(std::cmp::Ordering::Equal)
                });
                ranked.truncate(top_k);
                ranked
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoreSource;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRerank {
        scores: Vec<(usize, f32)>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RerankService for FixedRerank {
        async fn rerank(
            &self,
            _query: &str,
            _documents: &[String],
            _top_n: usize,
        ) -> Result<Vec<(usize, f32)>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.scores.clone())
        }
    }

    struct FailingRerank;

    #[async_trait]
    impl RerankService for FailingRerank {
        async fn rerank(
            &self,
            _query: &str,
            _documents: &[String],
            _top_n: usize,
        ) -> Result<Vec<(usize, f32)>> {
            Err(anyhow!("rerank service unavailable"))
        }
    }

    fn candidate(content: &str, score: StageScore) -> SearchResult {
        SearchResult {
            content: content.to_string(),
            source_url: format!("https://example.dk/{}", content),
            page_title: content.to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn orders_by_relevance_descending() {
        let service = Arc::new(FixedRerank {
            scores: vec![(0, 0.2), (1, 0.9), (2, 0.5)],
            calls: AtomicUsize::new(0),
        });
        let reranker = Reranker::new(service);

        let candidates = vec![
            candidate("a", StageScore::lexical(3.0)),
            candidate("b", StageScore::semantic(0.4)),
            candidate("c", StageScore::lexical(1.0)),
        ];

        let ranked = reranker.rerank("query", candidates, 10).await;

        let scores: Vec<f32> = ranked.iter().map(|r| r.score.value).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(ranked[0].result.content, "b");
        assert!(ranked.iter().all(|r| r.score.source == ScoreSource::Rerank));
    }

    #[tokio::test]
    async fn empty_candidates_skip_the_service() {
        let service = Arc::new(FixedRerank {
            scores: vec![],
            calls: AtomicUsize::new(0),
        });
        let reranker = Reranker::new(service.clone());

        let ranked = reranker.rerank("query", Vec::new(), 10).await;

        assert!(ranked.is_empty());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn service_failure_falls_back_to_stage_scores() {
        let reranker = Reranker::new(Arc::new(FailingRerank));

        let candidates = vec![
            candidate("low", StageScore::lexical(0.5)),
            candidate("high", StageScore::semantic(0.9)),
            candidate("mid", StageScore::lexical(0.7)),
        ];

        let ranked = reranker.rerank("query", candidates, 2).await;

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].result.content, "high");
        assert_eq!(ranked[1].result.content, "mid");
        // The degraded path keeps each candidate's own stage tag.
        assert_eq!(ranked[0].score.source, ScoreSource::Semantic);
    }

    #[tokio::test]
    async fn relevance_is_clamped_to_unit_interval() {
        let service = Arc::new(FixedRerank {
            scores: vec![(0, 1.7), (1, -0.3)],
            calls: AtomicUsize::new(0),
        });
        let reranker = Reranker::new(service);

        let candidates = vec![
            candidate("a", StageScore::lexical(1.0)),
            candidate("b", StageScore::lexical(1.0)),
        ];

        let ranked = reranker.rerank("query", candidates, 10).await;

        assert_eq!(ranked[0].score.value, 1.0);
        assert_eq!(ranked[1].score.value, 0.0);
    }
}
