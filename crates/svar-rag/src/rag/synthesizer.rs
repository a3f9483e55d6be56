//! Grounded answer synthesis.
//!
//! A per-request state machine: with no ranked candidates the fixed
//! no-information answer is emitted without touching the generation model.
//! Otherwise a single generation call judges relevance and composes the
//! answer; the branch the model took is recovered mechanically from its
//! output (citation link / no-information marker / plain text) so the rest
//! of the system can assert on an explicit outcome instead of parsing prose.

use std::collections::HashSet;
use std::sync::Arc;

use super::{citations, render_history};
use crate::llm::{ChatModel, GenerationOptions};
use crate::types::{
    Answer, AnswerOutcome, ConversationTurn, RankedResult, NO_INFORMATION_TEXT,
};

/// Phrase the prompt pins the model to when nothing is relevant; used to
/// recognize that branch in the output and normalize it to the fixed text.
const NO_INFORMATION_MARKER: &str = "ikke information om dette emne";

const DEFAULT_SYSTEM_PROMPT: &str = "\
Du er en hjælpsom og empatisk AI-assistent, der besvarer spørgsmål ud fra en vidensbase.

Vigtige retningslinjer:
- Svar altid på dansk
- Vær empatisk, varm og ikke-dømmende 💙
- Fokuser direkte på brugerens spørgsmål
- Hold svarene korte og præcise
- Brug kun information fra den givne kontekst eller samtalehistorikken";

pub struct AnswerSynthesizer {
    model: Arc<dyn ChatModel>,
    opts: GenerationOptions,
    system_prompt: String,
    max_chunks: usize,
    max_turns: usize,
    max_turn_chars: usize,
}

impl AnswerSynthesizer {
    pub fn new(
        model: Arc<dyn ChatModel>,
        opts: GenerationOptions,
        system_prompt: Option<String>,
        max_chunks: usize,
        max_turns: usize,
        max_turn_chars: usize,
    ) -> Self {
        Self {
            model,
            opts,
            system_prompt: system_prompt.unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            max_chunks,
            max_turns,
            max_turn_chars,
        }
    }

    pub async fn synthesize(
        &self,
        query: &str,
        ranked: &[RankedResult],
        history: &[ConversationTurn],
    ) -> Answer {
        if ranked.is_empty() {
            tracing::info!(query = query, "No candidates to synthesize from");
            return Answer::no_information();
        }

        let chunks = &ranked[..ranked.len().min(self.max_chunks)];
        let prompt = self.build_prompt(query, chunks, history);

        let output = match self
            .model
            .complete(Some(&self.system_prompt), &prompt, &self.opts)
            .await
        {
            Ok(output) => output.trim().to_string(),
            Err(e) => {
                tracing::warn!(error = %e, "Answer generation failed");
                return Answer::apology();
            }
        };

        self.resolve(output, chunks)
    }

    fn build_prompt(
        &self,
        query: &str,
        chunks: &[RankedResult],
        history: &[ConversationTurn],
    ) -> String {
        let mut blocks = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            blocks.push(format!(
                "[KILDE {}]\nTitel: {}\nURL: {}\nIndhold: {}\n",
                i + 1,
                chunk.result.page_title,
                chunk.result.source_url,
                chunk.result.content,
            ));
        }
        let context = blocks.join("\n---\n");

        let rendered_history = if history.is_empty() {
            "(ingen)".to_string()
        } else {
            render_history(history, self.max_turns, self.max_turn_chars)
        };

        format!(
            r#"Du får flere informationsstykker fra vidensbasen. Din opgave er at:

1. VURDER om NOGEN af informationsstykkerne er relevante for brugerens spørgsmål
2. HVIS der er relevant information:
   - Start dit svar med linket til det MEST relevante stykke i dette format: 🔗 [Titel](URL)
   - Saml information fra ALLE relevante stykker (ikke kun ét)
   - Giv et kort, empatisk svar (2-3 korte afsnit)
3. HVIS INGEN stykker er relevante, men spørgsmålet kan besvares alene ud fra samtalehistorikken:
   - Svar ud fra samtalehistorikken, uden link
4. HVIS INGEN af delene:
   - Inkluder IKKE noget link
   - Skriv præcis: "{no_information}"
   - Opfind IKKE information

Samtalehistorik:
{history}

Brugerens spørgsmål: {query}

Tilgængelige informationsstykker:
{context}

KRITISK VIGTIGT:
- Besvar brugerens spørgsmål direkte
- Brug ALDRIG navne, telefonnumre, adresser eller datoer der ikke står ordret i informationsstykkerne eller samtalehistorikken
- Hvis du inkluderer et link, kopier URL'en PRÆCIST fra det mest relevante stykke
- Vær MEGET streng med relevans — hvis informationen ikke direkte besvarer spørgsmålet, så brug punkt 3 eller 4
- Generer ALDRIG svar baseret på din egen viden

Svar:"#,
            no_information = NO_INFORMATION_TEXT,
            history = rendered_history,
            query = query,
            context = context,
        )
    }

    /// Map the model output to a terminal state. The citation link is the
    /// only mechanically verified piece of grounding: its URL must name one
    /// of the supplied candidates or it is stripped.
    fn resolve(&self, output: String, chunks: &[RankedResult]) -> Answer {
        let candidate_urls: HashSet<String> = chunks
            .iter()
            .map(|c| c.result.source_url.clone())
            .collect();

        let (text, citation) = citations::resolve_citation(&output, &candidate_urls);

        if let Some(citation) = citation {
            return Answer {
                text,
                has_citation: true,
                citation: Some(citation),
                outcome: AnswerOutcome::Answered,
            };
        }

        if text.contains(NO_INFORMATION_MARKER) {
            return Answer::no_information();
        }

        Answer {
            text,
            has_citation: false,
            citation: None,
            outcome: AnswerOutcome::AnsweredFromContext,
        }
    }
}
