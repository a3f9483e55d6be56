use anyhow::{Context, Result};
use std::sync::Arc;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{self, Schema, Value as TantivyValue, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, TantivyDocument};
use tokio::sync::OnceCell;

use crate::storage::VectorStore;
use crate::types::{SearchResult, StageScore};

struct BuiltIndex {
    index: Index,
    reader: IndexReader,
    content_field: schema::Field,
    title_field: schema::Field,
    url_field: schema::Field,
}

/// BM25 keyword search over the full passage corpus.
///
/// The index lives in RAM and is built lazily on first use from the store's
/// bulk fetch, then cached for the process lifetime. `OnceCell` guards the
/// build so concurrent first access never races two builds; a failed build
/// leaves the cell empty, so a later request can retry once the store
/// recovers.
pub struct LexicalEngine {
    store: Arc<dyn VectorStore>,
    corpus_limit: usize,
    built: OnceCell<BuiltIndex>,
}

impl LexicalEngine {
    pub fn new(store: Arc<dyn VectorStore>, corpus_limit: usize) -> Self {
        Self {
            store,
            corpus_limit,
            built: OnceCell::new(),
        }
    }

    fn build_schema() -> (Schema, schema::Field, schema::Field, schema::Field) {
        let mut sb = Schema::builder();
        let content_field = sb.add_text_field("content", TEXT | STORED);
        let title_field = sb.add_text_field("page_title", TEXT | STORED);
        let url_field = sb.add_text_field("source_url", STRING | STORED);
        (sb.build(), content_field, title_field, url_field)
    }

    async fn build(&self) -> Result<BuiltIndex> {
        let passages = self
            .store
            .fetch_all(self.corpus_limit)
            .await
            .context("Failed to fetch corpus for lexical index")?;

        let (schema, content_field, title_field, url_field) = Self::build_schema();
        let index = Index::create_in_ram(schema);

        let mut writer = index
            .writer(50_000_000)
            .context("Failed to create lexical index writer")?;

        for passage in &passages {
            writer.add_document(doc!(
                content_field => passage.content.as_str(),
                title_field => passage.page_title.as_str(),
                url_field => passage.source_url.as_str(),
            ))?;
        }
        writer.commit().context("Lexical index commit failed")?;

        let reader = index
            .reader()
            .context("Failed to create lexical index reader")?;
        reader.reload()?;

        tracing::info!(passages = passages.len(), "Lexical index built");

        Ok(BuiltIndex {
            index,
            reader,
            content_field,
            title_field,
            url_field,
        })
    }

    /// Keyword search; up to `limit` results with strictly positive BM25
    /// scores, descending. Index-build or query errors degrade to an empty
    /// list — retrieval never aborts the pipeline.
    pub async fn search(&self, query: &str, limit: usize) -> Vec<SearchResult> {
        let built = match self.built.get_or_try_init(|| self.build()).await {
            Ok(built) => built,
            Err(e) => {
                tracing::warn!(error = %e, "Lexical index unavailable, returning no results");
                return Vec::new();
            }
        };

        match Self::run_query(built, query, limit) {
            Ok(results) => results,
            Err(e) => {
                tracing::warn!(error = %e, query = query, "Lexical search failed");
                Vec::new()
            }
        }
    }

    fn run_query(built: &BuiltIndex, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let searcher = built.reader.searcher();
        let query_parser =
            QueryParser::for_index(&built.index, vec![built.content_field, built.title_field]);

        let parsed_query = match query_parser.parse_query(query) {
            Ok(q) => q,
            Err(_) => {
                // Strip quotes and retry as a phrase-free sanitized query.
                let escaped_query = query.replace('"', "");
                let fallback_parser =
                    QueryParser::for_index(&built.index, vec![built.content_field]);
                fallback_parser.parse_query(&format!("\"{}\"", escaped_query))?
            }
        };

        let top_docs = searcher.search(&parsed_query, &TopDocs::with_limit(limit))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            if score <= 0.0 {
                continue;
            }
            let doc: TantivyDocument = searcher.doc(doc_address)?;

            let field_text = |field: schema::Field| {
                doc.get_first(field)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };

            results.push(SearchResult {
                content: field_text(built.content_field),
                page_title: field_text(built.title_field),
                source_url: field_text(built.url_field),
                score: StageScore::lexical(score),
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::NeighborHit;
    use crate::types::Passage;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedStore {
        passages: Vec<Passage>,
        fetches: AtomicUsize,
    }

    #[async_trait]
    impl VectorStore for FixedStore {
        async fn nearest_neighbors(
            &self,
            _vector: &[f32],
            _limit: usize,
        ) -> Result<Vec<NeighborHit>> {
            Ok(Vec::new())
        }

        async fn fetch_all(&self, _limit: usize) -> Result<Vec<Passage>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.passages.clone())
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl VectorStore for BrokenStore {
        async fn nearest_neighbors(
            &self,
            _vector: &[f32],
            _limit: usize,
        ) -> Result<Vec<NeighborHit>> {
            Err(anyhow!("store down"))
        }

        async fn fetch_all(&self, _limit: usize) -> Result<Vec<Passage>> {
            Err(anyhow!("store down"))
        }
    }

    fn passage(content: &str, url: &str, title: &str) -> Passage {
        Passage {
            content: content.to_string(),
            source_url: url.to_string(),
            page_title: title.to_string(),
        }
    }

    #[tokio::test]
    async fn finds_matching_passages_descending() {
        let store = Arc::new(FixedStore {
            passages: vec![
                passage(
                    "Behandling af stofmisbrug tilbydes hver uge",
                    "https://example.dk/behandling",
                    "Behandling",
                ),
                passage(
                    "Åbningstider for rådgivning",
                    "https://example.dk/tider",
                    "Åbningstider",
                ),
                passage(
                    "Behandling behandling behandling af misbrug",
                    "https://example.dk/mere",
                    "Mere behandling",
                ),
            ],
            fetches: AtomicUsize::new(0),
        });
        let engine = LexicalEngine::new(store, 1000);

        let results = engine.search("behandling", 10).await;

        assert!(!results.is_empty());
        assert!(results.iter().all(|r| r.score.value > 0.0));
        let scores: Vec<f32> = results.iter().map(|r| r.score.value).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert!(results
            .iter()
            .all(|r| r.content.to_lowercase().contains("behandling")
                || r.page_title.to_lowercase().contains("behandling")));
    }

    #[tokio::test]
    async fn index_is_built_once_across_searches() {
        let store = Arc::new(FixedStore {
            passages: vec![passage("et dokument", "https://example.dk/a", "Et")],
            fetches: AtomicUsize::new(0),
        });
        let engine = LexicalEngine::new(store.clone(), 1000);

        engine.search("dokument", 5).await;
        engine.search("dokument", 5).await;
        engine.search("andet", 5).await;

        assert_eq!(store.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn store_failure_degrades_to_empty() {
        let engine = LexicalEngine::new(Arc::new(BrokenStore), 1000);
        let results = engine.search("behandling", 10).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn no_match_means_no_results() {
        let store = Arc::new(FixedStore {
            passages: vec![passage("alkoholbehandling", "https://example.dk/a", "A")],
            fetches: AtomicUsize::new(0),
        });
        let engine = LexicalEngine::new(store, 1000);

        let results = engine.search("zzzzukendt", 10).await;
        assert!(results.is_empty());
    }
}
