use serde::{Deserialize, Serialize};

/// Fixed answer text when no grounded information exists for the question.
pub const NO_INFORMATION_TEXT: &str =
    "Jeg har desværre ikke information om dette emne i vidensbasen. 💙";

/// Fixed answer text when the pipeline itself fails. The synthesizer's
/// generation-failure branch and the engine's last-line catch both emit it.
pub const APOLOGY_TEXT: &str = "Beklager, der opstod en fejl. Prøv venligst igen.";

/// Immutable unit of indexed content, produced by the (external) ingestion
/// pipeline and read-only to this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub source_url: String,
    pub page_title: String,
}

/// Which retrieval stage produced a score. Scores from different stages live
/// on incompatible scales (raw BM25, cosine similarity, rerank relevance) and
/// must never be compared across sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreSource {
    Lexical,
    Semantic,
    Rerank,
}

/// A stage-tagged relevance score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StageScore {
    pub source: ScoreSource,
    pub value: f32,
}

impl StageScore {
    pub fn lexical(value: f32) -> Self {
        Self { source: ScoreSource::Lexical, value }
    }

    pub fn semantic(value: f32) -> Self {
        Self { source: ScoreSource::Semantic, value }
    }

    pub fn rerank(value: f32) -> Self {
        Self { source: ScoreSource::Rerank, value }
    }
}

/// A single retrieval hit. Created fresh per search call; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    pub source_url: String,
    pub page_title: String,
    pub score: StageScore,
}

/// A candidate annotated with its final ranking score. In the normal path
/// the score source is `Rerank` with a value in [0, 1]; on the reranker's
/// degraded fallback the candidate's own stage score is carried instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResult {
    pub result: SearchResult,
    pub score: StageScore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation, supplied by the caller on every request.
/// The core reads history and never stores or mutates it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, text: text.into() }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, text: text.into() }
    }
}

/// The cited source of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
}

/// Terminal state of the synthesis state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerOutcome {
    /// Grounded in retrieved passages, with a citation.
    Answered,
    /// Grounded in conversation history alone; no citation.
    AnsweredFromContext,
    /// Nothing relevant retrieved and history does not answer the question.
    NoInformation,
    /// A failure was converted into the fixed apology answer.
    Failed,
}

/// The terminal artifact of a request. Constructed once by the synthesizer
/// (or the engine's failure catch) and never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub has_citation: bool,
    pub citation: Option<SourceRef>,
    pub outcome: AnswerOutcome,
}

impl Answer {
    pub fn no_information() -> Self {
        Self {
            text: NO_INFORMATION_TEXT.to_string(),
            has_citation: false,
            citation: None,
            outcome: AnswerOutcome::NoInformation,
        }
    }

    pub fn apology() -> Self {
        Self {
            text: APOLOGY_TEXT.to_string(),
            has_citation: false,
            citation: None,
            outcome: AnswerOutcome::Failed,
        }
    }
}
