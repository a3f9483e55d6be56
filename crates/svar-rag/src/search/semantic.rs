use std::sync::Arc;

use crate::embeddings::EmbeddingService;
use crate::storage::VectorStore;
use crate::types::{SearchResult, StageScore};

/// Dense-vector nearest-neighbor search: embed the query, then k-NN against
/// the store's pre-computed passage vectors.
pub struct SemanticEngine {
    embeddings: Arc<dyn EmbeddingService>,
    store: Arc<dyn VectorStore>,
}

impl SemanticEngine {
    pub fn new(embeddings: Arc<dyn EmbeddingService>, store: Arc<dyn VectorStore>) -> Self {
        Self { embeddings, store }
    }

    /// Up to `limit` nearest passages. Similarity is `1 − distance` so that
    /// higher is better, matching the lexical engine's ordering convention.
    /// Embedding or store errors degrade to an empty list.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let vector = match self.embeddings.embed_query(query).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(error = %e, "Query embedding failed");
                return Vec::new();
            }
        };

        let hits = match self.store.nearest_neighbors(&vector, limit).await {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!(error = %e, "Vector search failed");
                return Vec::new();
            }
        };

        hits.into_iter()
            .map(|hit| SearchResult {
                content: hit.passage.content,
                source_url: hit.passage.source_url,
                page_title: hit.passage.page_title,
                score: StageScore::semantic(1.0 - hit.distance),
            })
            .collect()
    }
}
