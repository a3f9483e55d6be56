use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

use super::{NeighborHit, VectorStore};
use crate::types::Passage;

/// Weaviate GraphQL client. Reads the collection the crawler populates;
/// schema fields are `content`, `source_url` and `page_title`.
pub struct WeaviateStore {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
}

impl WeaviateStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        collection: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            collection: collection.into(),
        })
    }

    async fn graphql(&self, query: String) -> Result<Value> {
        let endpoint = format!("{}/v1/graphql", self.base_url);

        let mut request = self.client.post(&endpoint).json(&json!({ "query": query }));
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    anyhow!("Vector store request to {} timed out", endpoint)
                } else {
                    anyhow!("Vector store request to {} failed: {}", endpoint, e)
                }
            })?;

        let status = response.status();
        let body: Value = response
            .json()
            .await
            .with_context(|| format!("Failed to parse vector store response (HTTP {})", status))?;

        if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
            if !errors.is_empty() {
                return Err(anyhow!("Vector store query returned errors: {}", errors[0]));
            }
        }

        Ok(body)
    }

    /// Pull the typed object array out of `data.Get.<Collection>`.
    fn objects<'a>(&self, body: &'a Value) -> Result<&'a Vec<Value>> {
        body["data"]["Get"][&self.collection]
            .as_array()
            .ok_or_else(|| anyhow!("Vector store response missing '{}' objects", self.collection))
    }

    fn passage_from(obj: &Value) -> Passage {
        Passage {
            content: obj["content"].as_str().unwrap_or_default().to_string(),
            source_url: obj["source_url"].as_str().unwrap_or_default().to_string(),
            page_title: obj["page_title"].as_str().unwrap_or_default().to_string(),
        }
    }
}

#[async_trait]
impl VectorStore for WeaviateStore {
    async fn nearest_neighbors(&self, vector: &[f32], limit: usize) -> Result<Vec<NeighborHit>> {
        let vector_json =
            serde_json::to_string(vector).context("Failed to serialize query vector")?;

        let query = format!(
            "{{ Get {{ {}(nearVector: {{vector: {}}}, limit: {}) \
             {{ content source_url page_title _additional {{ distance }} }} }} }}",
            self.collection, vector_json, limit
        );

        let body = self.graphql(query).await?;
        let objects = self.objects(&body)?;

        let hits = objects
            .iter()
            .map(|obj| NeighborHit {
                passage: Self::passage_from(obj),
                distance: obj["_additional"]["distance"].as_f64().unwrap_or(1.0) as f32,
            })
            .collect();

        Ok(hits)
    }

    async fn fetch_all(&self, limit: usize) -> Result<Vec<Passage>> {
        let query = format!(
            "{{ Get {{ {}(limit: {}) {{ content source_url page_title }} }} }}",
            self.collection, limit
        );

        let body = self.graphql(query).await?;
        let objects = self.objects(&body)?;

        Ok(objects.iter().map(Self::passage_from).collect())
    }
}
