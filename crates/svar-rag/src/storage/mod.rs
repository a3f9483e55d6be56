pub mod weaviate;

pub use weaviate::WeaviateStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::Passage;

/// A nearest-neighbor hit from the vector store. `distance` is the store's
/// raw metric (lower is closer); the semantic engine converts it to a
/// similarity before it leaves the retrieval layer.
#[derive(Debug, Clone)]
pub struct NeighborHit {
    pub passage: Passage,
    pub distance: f32,
}

/// Vector-store seam. The store is populated by the external ingestion
/// pipeline; this crate only reads from it.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Nearest-neighbor search over pre-computed passage vectors.
    async fn nearest_neighbors(&self, vector: &[f32], limit: usize) -> Result<Vec<NeighborHit>>;

    /// Bulk-fetch the passage corpus, used to build the lexical index.
    async fn fetch_all(&self, limit: usize) -> Result<Vec<Passage>>;
}
