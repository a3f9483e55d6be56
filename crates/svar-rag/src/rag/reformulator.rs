//! Conversation-aware query reformulation.
//!
//! Turns the current utterance plus recent turns into a search-optimized
//! variant: pronouns and ellipsis are resolved against the conversation so
//! the query is self-contained. The original query is never dropped — it is
//! always position 0 of the returned variants, guaranteeing a fallback.

use std::sync::Arc;

use super::render_history;
use crate::llm::{ChatModel, GenerationOptions};
use crate::types::ConversationTurn;

pub struct QueryReformulator {
    model: Arc<dyn ChatModel>,
    opts: GenerationOptions,
    max_turns: usize,
    max_turn_chars: usize,
}

impl QueryReformulator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        opts: GenerationOptions,
        max_turns: usize,
        max_turn_chars: usize,
    ) -> Self {
        Self {
            model,
            opts,
            max_turns,
            max_turn_chars,
        }
    }

    /// Produce the query variants for retrieval. With no history there is
    /// nothing to resolve pronouns against, so no reformulation is attempted.
    /// At most two variants are ever returned; any reformulation failure
    /// falls open to the unmodified query.
    pub async fn reformulate(&self, query: &str, history: &[ConversationTurn]) -> Vec<String> {
        if history.is_empty() {
            return vec![query.to_string()];
        }

        let context = render_history(history, self.max_turns, self.max_turn_chars);
        let prompt = self.build_prompt(query, &context);

        match self.model.complete(None, &prompt, &self.opts).await {
            Ok(output) => {
                let rewritten = Self::clean_output(&output);
                if rewritten.is_empty() {
                    tracing::warn!(query = query, "Reformulation produced empty output");
                    return vec![query.to_string()];
                }
                if rewritten.to_lowercase() == query.to_lowercase() {
                    return vec![query.to_string()];
                }
                tracing::debug!(original = query, rewritten = %rewritten, "Query reformulated");
                vec![query.to_string(), rewritten]
            }
            Err(e) => {
                tracing::warn!(error = %e, query = query, "Reformulation failed, using original query");
                vec![query.to_string()]
            }
        }
    }

    fn build_prompt(&self, query: &str, context: &str) -> String {
        format!(
            r#"Du er en ekspert i at omformulere søgeforespørgsler til websøgning baseret på samtalehistorik.

Samtalehistorik:
{context}

Nuværende bruger-spørgsmål: "{query}"

DIN OPGAVE:
1. ANALYSER samtalehistorikken for at forstå den afledte kontekst af brugerens spørgsmål
2. IDENTIFICER hvad brugeren egentlig spørger om baseret på samtaleforløbet
3. OMFORMULER spørgsmålet til en optimal søgeforespørgsel der:
   - Erstatter ALLE pronominer (hans, hendes, det, den, dem) med konkrete navne/ting fra samtalen
   - Inkluderer relevant kontekst fra samtalen der gør søgningen mere præcis
   - Er formuleret som en klar, specifik søgeforespørgsel — ikke en hel sætning

EKSEMPLER:
- Samtale om "direktør Nicolai Halberg" → Spørgsmål: "hvad er hans nummer?" → Omskrivning: "Nicolai Halberg telefonnummer kontaktoplysninger"
- Samtale om "behandlingstilbud" → Spørgsmål: "hvor kan jeg få det?" → Omskrivning: "hvor kan jeg få behandling for stofmisbrug"
- Samtale om "åbningstider" → Spørgsmål: "hvad med weekenden?" → Omskrivning: "åbningstider weekend lørdag søndag"

Returner KUN den omformulerede søgeforespørgsel, ingen forklaring:"#
        )
    }

    /// First non-empty line of the model output, stripped of surrounding
    /// quotes and whitespace.
    fn clean_output(output: &str) -> String {
        let line = output
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("");
        line.trim_matches(|c| c == '"' || c == '\'').trim().to_string()
    }
}
