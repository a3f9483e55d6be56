use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub history: HistoryConfig,
    pub search: SearchConfig,
    pub services: ServicesConfig,
    /// Override for the synthesizer's system prompt. `None` uses the
    /// built-in Danish assistant persona.
    pub system_prompt: Option<String>,
}

/// Bounds on the conversation window shown to the reformulator and the
/// synthesizer. Older turns are silently dropped, never errored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub max_turns: usize,
    pub max_turn_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Results requested from each engine per query variant.
    pub per_query_limit: usize,
    /// Candidates kept after reranking.
    pub rerank_top_k: usize,
    /// Ranked candidates handed to the generation model.
    pub synthesis_chunks: usize,
    /// Content-prefix length of the candidate dedup key.
    pub dedup_prefix_chars: usize,
    /// Passages fetched from the store when building the lexical index.
    pub corpus_fetch_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicesConfig {
    pub weaviate_url: String,
    pub weaviate_api_key: Option<String>,
    pub cohere_api_key: Option<String>,
    pub openrouter_api_key: Option<String>,
    pub collection: String,
    pub embed_model: String,
    pub rerank_model: String,
    pub rewrite_model: String,
    pub answer_model: String,
    pub request_timeout_secs: u64,
}

impl RagConfig {
    /// Validate config values, returning errors for clearly broken configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.history.max_turns == 0 {
            return Err("history.max_turns must be > 0".into());
        }
        if self.history.max_turn_chars == 0 {
            return Err("history.max_turn_chars must be > 0".into());
        }
        if self.search.per_query_limit == 0 {
            return Err("search.per_query_limit must be > 0".into());
        }
        if self.search.rerank_top_k == 0 {
            return Err("search.rerank_top_k must be > 0".into());
        }
        if self.search.synthesis_chunks == 0 {
            return Err("search.synthesis_chunks must be > 0".into());
        }
        if self.search.dedup_prefix_chars == 0 {
            return Err("search.dedup_prefix_chars must be > 0".into());
        }
        if self.search.corpus_fetch_limit == 0 {
            return Err("search.corpus_fetch_limit must be > 0".into());
        }
        if self.services.request_timeout_secs == 0 {
            return Err("services.request_timeout_secs must be > 0".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing fields.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig {
                max_turns: 6,
                max_turn_chars: 300,
            },
            search: SearchConfig {
                per_query_limit: 15,
                rerank_top_k: 15,
                synthesis_chunks: 10,
                dedup_prefix_chars: 100,
                corpus_fetch_limit: 1000,
            },
            services: ServicesConfig {
                weaviate_url: std::env::var("WEAVIATE_URL")
                    .unwrap_or_else(|_| "http://localhost:8080".to_string()),
                weaviate_api_key: std::env::var("WEAVIATE_API_KEY").ok(),
                cohere_api_key: std::env::var("COHERE_API_KEY").ok(),
                openrouter_api_key: std::env::var("OPENROUTER_API_KEY").ok(),
                collection: "KnowledgeContent".to_string(),
                embed_model: "embed-multilingual-v3.0".to_string(),
                rerank_model: "rerank-multilingual-v3.0".to_string(),
                rewrite_model: "openai/gpt-4o-mini".to_string(),
                answer_model: "anthropic/claude-sonnet-4.5".to_string(),
                request_timeout_secs: 30,
            },
            system_prompt: None,
        }
    }
}
