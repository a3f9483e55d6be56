//! Chat-model seam. The pipeline calls a text generation service twice per
//! request — query reformulation and answer synthesis — with different
//! models and sampling options. Streaming is a transport concern and not
//! part of this boundary; the core only needs the final text.

pub mod openrouter;

pub use openrouter::OpenRouterClient;

use anyhow::Result;
use async_trait::async_trait;

/// Per-call generation settings.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Run one completion and return the final text.
    async fn complete(
        &self,
        system: Option<&str>,
        prompt: &str,
        opts: &GenerationOptions,
    ) -> Result<String>;
}
