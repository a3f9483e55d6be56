use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::EmbeddingService;
use crate::reranking::RerankService;

const EMBED_ENDPOINT: &str = "https://api.cohere.ai/v1/embed";
const RERANK_ENDPOINT: &str = "https://api.cohere.ai/v1/rerank";

/// Cohere client. One client serves both the embedding and the rerank
/// boundary, as the deployment uses the same account for both.
pub struct CohereClient {
    client: Client,
    api_key: String,
    embed_model: String,
    rerank_model: String,
}

impl CohereClient {
    pub fn new(
        api_key: String,
        embed_model: String,
        rerank_model: String,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            embed_model,
            rerank_model,
        })
    }

    async fn post_json(&self, endpoint: &str, payload: Value) -> Result<Value> {
        let response = self
            .client
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("Request to {} timed out", endpoint)
                } else {
                    anyhow!("Request to {} failed: {}", endpoint, e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error = response.text().await.unwrap_or_default();
            let preview: String = error.chars().take(300).collect();
            return Err(anyhow!("{} returned HTTP {}: {}", endpoint, status, preview));
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON from {}", endpoint))
    }
}

#[async_trait]
impl EmbeddingService for CohereClient {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let payload = json!({
            "texts": [text],
            "model": self.embed_model,
            "input_type": "search_query",
        });

        let body = self.post_json(EMBED_ENDPOINT, payload).await?;

        let embedding = body["embeddings"][0]
            .as_array()
            .ok_or_else(|| anyhow!("Embed response has no embeddings array"))?;

        embedding
            .iter()
            .map(|v| {
                v.as_f64()
                    .map(|f| f as f32)
                    .ok_or_else(|| anyhow!("Embed response contains a non-numeric component"))
            })
            .collect()
    }
}

#[async_trait]
impl RerankService for CohereClient {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        top_n: usize,
    ) -> Result<Vec<(usize, f32)>> {
        let payload = json!({
            "model": self.rerank_model,
            "query": query,
            "documents": documents,
            "top_n": top_n,
        });

        let body = self.post_json(RERANK_ENDPOINT, payload).await?;

        let results = body["results"]
            .as_array()
            .ok_or_else(|| anyhow!("Rerank response has no results array"))?;

        let mut scored = Vec::with_capacity(results.len());
        for result in results {
            let index = result["index"]
                .as_u64()
                .ok_or_else(|| anyhow!("Rerank result missing index"))?
                as usize;
            let relevance = result["relevance_score"]
                .as_f64()
                .ok_or_else(|| anyhow!("Rerank result missing relevance_score"))?
                as f32;
            scored.push((index, relevance));
        }

        Ok(scored)
    }
}
