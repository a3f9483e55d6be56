pub mod citations;
pub mod reformulator;
pub mod synthesizer;

pub use reformulator::QueryReformulator;
pub use synthesizer::AnswerSynthesizer;

use crate::types::{ConversationTurn, Role};

/// Render the last `max_turns` turns for a prompt, each truncated to
/// `max_turn_chars` characters on a char boundary. Older turns are silently
/// dropped — the window is a bound, not a validation.
pub(crate) fn render_history(
    history: &[ConversationTurn],
    max_turns: usize,
    max_turn_chars: usize,
) -> String {
    let start = history.len().saturating_sub(max_turns);
    history[start..]
        .iter()
        .map(|turn| {
            let label = match turn.role {
                Role::User => "Bruger",
                Role::Assistant => "Assistent",
            };
            let preview: String = turn.text.chars().take(max_turn_chars).collect();
            format!("{}: {}", label, preview)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
