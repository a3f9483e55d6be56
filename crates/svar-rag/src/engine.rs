//! The request orchestrator: reformulate → hybrid retrieval → rerank →
//! synthesize, with a fixed pipeline configuration and no branching. Every
//! stage degrades internally; this level converts anything that still
//! escapes (a panic in the chain) into the fixed apology answer, so the
//! caller always receives a well-formed [`Answer`].

use anyhow::{anyhow, Context, Result};
use futures::FutureExt;
use std::sync::Arc;

use crate::config::RagConfig;
use crate::embeddings::{CohereClient, EmbeddingService};
use crate::llm::{ChatModel, GenerationOptions, OpenRouterClient};
use crate::rag::{AnswerSynthesizer, QueryReformulator};
use crate::reranking::{Reranker, RerankService};
use crate::search::{HybridRetriever, LexicalEngine, SemanticEngine};
use crate::storage::{VectorStore, WeaviateStore};
use crate::types::{Answer, ConversationTurn};

pub struct AnswerEngine {
    reformulator: QueryReformulator,
    retriever: HybridRetriever,
    reranker: Reranker,
    synthesizer: AnswerSynthesizer,
    per_query_limit: usize,
    rerank_top_k: usize,
}

impl AnswerEngine {
    /// Wire the engine against caller-supplied service implementations.
    /// The engine never names concrete service types beyond this seam.
    pub fn new(
        config: &RagConfig,
        store: Arc<dyn VectorStore>,
        embeddings: Arc<dyn EmbeddingService>,
        rerank: Arc<dyn RerankService>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        let rewrite_opts = GenerationOptions {
            model: config.services.rewrite_model.clone(),
            max_tokens: 100,
            temperature: 0.1,
        };
        let answer_opts = GenerationOptions {
            model: config.services.answer_model.clone(),
            max_tokens: 1024,
            temperature: 0.0,
        };

        let reformulator = QueryReformulator::new(
            chat.clone(),
            rewrite_opts,
            config.history.max_turns,
            config.history.max_turn_chars,
        );

        let retriever = HybridRetriever::new(
            LexicalEngine::new(store.clone(), config.search.corpus_fetch_limit),
            SemanticEngine::new(embeddings, store),
            config.search.dedup_prefix_chars,
        );

        let synthesizer = AnswerSynthesizer::new(
            chat,
            answer_opts,
            config.system_prompt.clone(),
            config.search.synthesis_chunks,
            config.history.max_turns,
            config.history.max_turn_chars,
        );

        Self {
            reformulator,
            retriever,
            reranker: Reranker::new(rerank),
            synthesizer,
            per_query_limit: config.search.per_query_limit,
            rerank_top_k: config.search.rerank_top_k,
        }
    }

    /// Wire the engine against the deployment's concrete services
    /// (Weaviate, Cohere, OpenRouter) from config and environment.
    pub fn from_config(config: &RagConfig) -> Result<Self> {
        config.validate().map_err(|e| anyhow!(e))?;

        let services = &config.services;
        let timeout = services.request_timeout_secs;

        let store = WeaviateStore::new(
            services.weaviate_url.clone(),
            services.weaviate_api_key.clone(),
            services.collection.clone(),
            timeout,
        )
        .context("Failed to initialize vector store client")?;

        let cohere_key = services
            .cohere_api_key
            .clone()
            .ok_or_else(|| anyhow!("COHERE_API_KEY is not configured"))?;
        let cohere = Arc::new(
            CohereClient::new(
                cohere_key,
                services.embed_model.clone(),
                services.rerank_model.clone(),
                timeout,
            )
            .context("Failed to initialize Cohere client")?,
        );

        let openrouter_key = services
            .openrouter_api_key
            .clone()
            .ok_or_else(|| anyhow!("OPENROUTER_API_KEY is not configured"))?;
        let chat = Arc::new(
            OpenRouterClient::new(openrouter_key, timeout)
                .context("Failed to initialize chat client")?,
        );

        Ok(Self::new(
            config,
            Arc::new(store),
            cohere.clone(),
            cohere,
            chat,
        ))
    }

    /// Answer a question over the knowledge base. Always returns a
    /// well-formed answer; failures surface as the fixed apology text,
    /// never as an error.
    pub async fn answer(&self, query: &str, history: &[ConversationTurn]) -> Answer {
        let pipeline = std::panic::AssertUnwindSafe(self.run_pipeline(query, history));
        match pipeline.catch_unwind().await {
            Ok(answer) => answer,
            Err(_) => {
                tracing::error!(query = query, "Answer pipeline panicked");
                Answer::apology()
            }
        }
    }

    async fn run_pipeline(&self, query: &str, history: &[ConversationTurn]) -> Answer {
        let variants = self.reformulator.reformulate(query, history).await;

        let candidates = self
            .retriever
            .search(&variants, self.per_query_limit)
            .await;

        // Reranking and grounding always use the original query; variants
        // exist for retrieval only.
        let ranked = self
            .reranker
            .rerank(query, candidates, self.rerank_top_k)
            .await;

        tracing::info!(
            variants = variants.len(),
            ranked = ranked.len(),
            "Retrieval complete"
        );

        self.synthesizer.synthesize(query, &ranked, history).await
    }
}
