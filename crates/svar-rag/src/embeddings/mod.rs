pub mod cohere;

pub use cohere::CohereClient;

use anyhow::Result;
use async_trait::async_trait;

/// Embedding-service seam. Document embedding happens in the external
/// ingestion pipeline; the core only ever embeds queries.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
