//! Grounded question answering over a crawled knowledge base.
//!
//! The pipeline runs four stages per request — conversation-aware query
//! reformulation, hybrid (BM25 + vector) retrieval with deduplication,
//! cross-encoder reranking, and relevance-gated answer synthesis — and
//! always returns a well-formed [`Answer`], degrading gracefully when any
//! external service misbehaves.

pub mod config;
pub mod embeddings;
pub mod engine;
pub mod llm;
pub mod rag;
pub mod reranking;
pub mod search;
pub mod storage;
pub mod types;

// Re-export primary types for convenience
pub use config::RagConfig;
pub use engine::AnswerEngine;
pub use types::{
    Answer, AnswerOutcome, ConversationTurn, Passage, RankedResult, Role, ScoreSource,
    SearchResult, SourceRef, StageScore, APOLOGY_TEXT, NO_INFORMATION_TEXT,
};

// Re-export common types
pub use anyhow::{Error, Result};
