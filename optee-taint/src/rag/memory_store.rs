use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Document, VectorStore};

/// In-process [`VectorStore`] that ranks documents by token overlap
/// with the query rather than embedding similarity.
///
/// This is a reference implementation, not a production retrieval
/// engine: it exists so the pipeline has something real to run
/// against without requiring an external embeddings API, matching the
/// spec's framing of RAG as optional enrichment rather than a load-bearing
/// dependency.
#[derive(Default)]
pub struct InMemoryVectorStore {
    documents: RwLock<Vec<Document>>,
}

impl InMemoryVectorStore {
    /// Builds an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn build_index(&self, documents: Vec<Document>) {
        *self.documents.write().await = documents;
    }

    async fn similarity_search(&self, query: &str, top_k: usize) -> Vec<Document> {
        let query_tokens = tokenize(query);
        let documents = self.documents.read().await;
        let mut scored: Vec<(usize, &Document)> = documents
            .iter()
            .map(|doc| (overlap_score(&query_tokens, &tokenize(&doc.text)), doc))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(top_k)
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    async fn search_by_api(&self, api_name: &str) -> Vec<Document> {
        self.documents
            .read()
            .await
            .iter()
            .filter(|doc| doc.source == api_name || doc.text.contains(api_name))
            .cloned()
            .collect()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn overlap_score(query: &HashSet<String>, doc: &HashSet<String>) -> usize {
    query.intersection(doc).count()
}
