use futures::future::join_all;
use std::collections::HashSet;

use super::lexical::LexicalEngine;
use super::semantic::SemanticEngine;
use crate::types::SearchResult;

/// Issues lexical and semantic search for every query variant and merges the
/// hits into a deduplicated candidate set. Ordering by relevance is the
/// reranker's job; this stage only guarantees the dedup invariant.
pub struct HybridRetriever {
    lexical: LexicalEngine,
    semantic: SemanticEngine,
    dedup_prefix_chars: usize,
}

impl HybridRetriever {
    pub fn new(
        lexical: LexicalEngine,
        semantic: SemanticEngine,
        dedup_prefix_chars: usize,
    ) -> Self {
        Self {
            lexical,
            semantic,
            dedup_prefix_chars,
        }
    }

    /// Candidate-set fingerprint: source URL plus a fixed-length content
    /// prefix. Near-duplicates that only diverge after the prefix collapse
    /// into one entry; the key is the prefix, not the full text.
    fn fingerprint(&self, result: &SearchResult) -> (String, String) {
        let prefix: String = result.content.chars().take(self.dedup_prefix_chars).collect();
        (result.source_url.clone(), prefix)
    }

    /// Search all variants with both engines and return the deduplicated
    /// union. The two engines run concurrently per variant; merge order is
    /// deterministic regardless: lexical before semantic within a variant,
    /// variants in the given order. The first-seen entry wins a duplicate
    /// key, so which engine's score survives depends on that order.
    pub async fn search(&self, variants: &[String], per_query_limit: usize) -> Vec<SearchResult> {
        let per_variant = join_all(variants.iter().map(|variant| async move {
            tokio::join!(
                self.lexical.search(variant, per_query_limit),
                self.semantic.search(variant, per_query_limit),
            )
        }))
        .await;

        let mut seen: HashSet<(String, String)> = HashSet::new();
        let mut unique = Vec::new();

        for (lexical_hits, semantic_hits) in per_variant {
            for result in lexical_hits.into_iter().chain(semantic_hits) {
                let key = self.fingerprint(&result);
                if seen.insert(key) {
                    unique.push(result);
                }
            }
        }

        tracing::debug!(
            variants = variants.len(),
            unique = unique.len(),
            "Hybrid search merged"
        );

        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::EmbeddingService;
    use crate::storage::{NeighborHit, VectorStore};
    use crate::types::{Passage, ScoreSource};
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct FixedEmbeddings;

    #[async_trait]
    impl EmbeddingService for FixedEmbeddings {
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.5; 4])
        }
    }

    /// Store whose corpus feeds the lexical index and whose neighbor list
    /// feeds semantic search, independently controllable.
    struct SplitStore {
        corpus: Vec<Passage>,
        neighbors: Vec<NeighborHit>,
        fail_neighbors: bool,
        fail_corpus: bool,
    }

    #[async_trait]
    impl VectorStore for SplitStore {
        async fn nearest_neighbors(
            &self,
            _vector: &[f32],
            _limit: usize,
        ) -> Result<Vec<NeighborHit>> {
            if self.fail_neighbors {
                return Err(anyhow!("vector store down"));
            }
            Ok(self.neighbors.clone())
        }

        async fn fetch_all(&self, _limit: usize) -> Result<Vec<Passage>> {
            if self.fail_corpus {
                return Err(anyhow!("bulk fetch down"));
            }
            Ok(self.corpus.clone())
        }
    }

    fn passage(content: &str, url: &str) -> Passage {
        Passage {
            content: content.to_string(),
            source_url: url.to_string(),
            page_title: "Titel".to_string(),
        }
    }

    fn retriever(store: Arc<SplitStore>, prefix: usize) -> HybridRetriever {
        HybridRetriever::new(
            LexicalEngine::new(store.clone(), 1000),
            SemanticEngine::new(Arc::new(FixedEmbeddings), store),
            prefix,
        )
    }

    #[tokio::test]
    async fn first_seen_entry_wins_duplicates() {
        // The same passage reachable through both engines: the lexical hit
        // comes first in merge order, so its score survives.
        let content = "Behandling af stofmisbrug foregår i centret";
        let store = Arc::new(SplitStore {
            corpus: vec![passage(content, "https://example.dk/b")],
            neighbors: vec![NeighborHit {
                passage: passage(content, "https://example.dk/b"),
                distance: 0.1,
            }],
            fail_neighbors: false,
            fail_corpus: false,
        });

        let results = retriever(store, 100)
            .search(&["behandling".to_string()], 10)
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score.source, ScoreSource::Lexical);
    }

    #[tokio::test]
    async fn prefix_key_collapses_divergent_suffixes() {
        // Identical URL and identical first 100 chars, different endings:
        // only one entry survives. The dedup key is the content prefix.
        let stem = "a".repeat(100);
        let first = format!("{}FØRSTE HALE", stem);
        let second = format!("{}ANDEN HALE", stem);

        let store = Arc::new(SplitStore {
            corpus: vec![],
            neighbors: vec![
                NeighborHit {
                    passage: passage(&first, "https://example.dk/samme"),
                    distance: 0.1,
                },
                NeighborHit {
                    passage: passage(&second, "https://example.dk/samme"),
                    distance: 0.2,
                },
            ],
            fail_neighbors: false,
            fail_corpus: false,
        });

        let results = retriever(store, 100)
            .search(&["spørgsmål".to_string()], 10)
            .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].content.contains("FØRSTE"));
    }

    #[tokio::test]
    async fn same_prefix_different_url_both_survive() {
        let content = "b".repeat(120);
        let store = Arc::new(SplitStore {
            corpus: vec![],
            neighbors: vec![
                NeighborHit {
                    passage: passage(&content, "https://example.dk/en"),
                    distance: 0.1,
                },
                NeighborHit {
                    passage: passage(&content, "https://example.dk/to"),
                    distance: 0.2,
                },
            ],
            fail_neighbors: false,
            fail_corpus: false,
        });

        let results = retriever(store, 100)
            .search(&["spørgsmål".to_string()], 10)
            .await;

        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn semantic_failure_leaves_lexical_results_intact() {
        let store = Arc::new(SplitStore {
            corpus: vec![passage(
                "rådgivning om alkoholbehandling",
                "https://example.dk/alkohol",
            )],
            neighbors: vec![],
            fail_neighbors: true,
            fail_corpus: false,
        });

        let results = retriever(store, 100)
            .search(&["alkoholbehandling".to_string()], 10)
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score.source, ScoreSource::Lexical);
    }

    #[tokio::test]
    async fn lexical_failure_leaves_semantic_results_intact() {
        let store = Arc::new(SplitStore {
            corpus: vec![],
            neighbors: vec![NeighborHit {
                passage: passage("rådgivning om alkoholbehandling", "https://example.dk/alkohol"),
                distance: 0.3,
            }],
            fail_neighbors: false,
            fail_corpus: true,
        });

        let results = retriever(store, 100)
            .search(&["alkoholbehandling".to_string()], 10)
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score.source, ScoreSource::Semantic);
    }

    #[tokio::test]
    async fn variants_extend_the_candidate_set() {
        let store = Arc::new(SplitStore {
            corpus: vec![
                passage("åbningstider mandag til fredag", "https://example.dk/tider"),
                passage("kontakt telefonnummer reception", "https://example.dk/kontakt"),
            ],
            neighbors: vec![],
            fail_neighbors: false,
            fail_corpus: false,
        });

        let results = retriever(store, 100)
            .search(
                &["åbningstider".to_string(), "telefonnummer".to_string()],
                10,
            )
            .await;

        assert_eq!(results.len(), 2);
    }
}
