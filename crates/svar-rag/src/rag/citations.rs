//! Citation handling for synthesized answers.
//!
//! The generation model is instructed to open a grounded answer with a
//! `🔗 [Titel](URL)` link to its most relevant source. This module extracts
//! that link and checks the URL against the supplied candidate set, so an
//! answer can never surface a citation pointing outside the retrieval
//! results. Fact-level grounding beyond the URL is a prompting contract and
//! is not verified here.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::types::SourceRef;

static MARKDOWN_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:🔗\s*)?\[([^\]]+)\]\(([^)\s]+)\)").expect("markdown link regex is valid")
});

/// First markdown link in the answer, if any.
pub fn extract_link(text: &str) -> Option<SourceRef> {
    MARKDOWN_LINK_RE.captures(text).map(|cap| SourceRef {
        title: cap[1].to_string(),
        url: cap[2].to_string(),
    })
}

/// Resolve the answer's citation against the candidate URLs.
///
/// Returns the (possibly cleaned) answer text and the validated citation.
/// A link whose URL is not among the candidates is removed from the text and
/// logged — the answer stays, the fabricated citation does not.
pub fn resolve_citation(
    text: &str,
    candidate_urls: &HashSet<String>,
) -> (String, Option<SourceRef>) {
    let Some(link) = extract_link(text) else {
        return (text.to_string(), None);
    };

    if candidate_urls.contains(&link.url) {
        return (text.to_string(), Some(link));
    }

    tracing::warn!(
        url = %link.url,
        "Generated answer cited a URL outside the retrieved candidates; stripping link"
    );

    let cleaned = MARKDOWN_LINK_RE.replace(text, "").trim().to_string();
    (cleaned, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_link_with_marker() {
        let link = extract_link("🔗 [Behandling](https://example.dk/behandling)\n\nSvaret er...")
            .expect("link");
        assert_eq!(link.title, "Behandling");
        assert_eq!(link.url, "https://example.dk/behandling");
    }

    #[test]
    fn no_link_means_no_citation() {
        assert!(extract_link("Bare et svar uden kilder.").is_none());
    }

    #[test]
    fn known_url_is_kept() {
        let text = "🔗 [Behandling](https://example.dk/behandling)\n\nVi tilbyder behandling.";
        let (cleaned, citation) = resolve_citation(text, &urls(&["https://example.dk/behandling"]));

        assert_eq!(cleaned, text);
        let citation = citation.expect("citation");
        assert_eq!(citation.url, "https://example.dk/behandling");
    }

    #[test]
    fn fabricated_url_is_stripped() {
        let text = "🔗 [Opdigtet](https://fremmed.dk/side)\n\nVi tilbyder behandling.";
        let (cleaned, citation) = resolve_citation(text, &urls(&["https://example.dk/behandling"]));

        assert!(citation.is_none());
        assert!(!cleaned.contains("fremmed.dk"));
        assert!(cleaned.contains("Vi tilbyder behandling."));
    }
}
