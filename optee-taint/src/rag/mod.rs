//! Optional retrieval-augmented context for the taint analyzer.
//!
//! Per spec.md §6, RAG is an optional enrichment: the pipeline runs
//! identically with no [`VectorStore`] configured, just without the
//! extra "related code" context injected into P5's prompts.

mod loader;
mod memory_store;

pub use loader::PlainTextDocumentLoader;
pub use memory_store::InMemoryVectorStore;

use async_trait::async_trait;

/// A chunk of reference text plus the metadata needed to cite it back
/// in a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Where this chunk came from (file path, API name, or similar).
    pub source: String,
    /// The chunk's text content.
    pub text: String,
}

/// Abstraction over similarity search, implemented once in-memory for
/// this crate's reference build and swappable for a real vector
/// database by downstream integrators.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Indexes `documents`, replacing any previous index.
    async fn build_index(&self, documents: Vec<Document>);

    /// Returns the `top_k` documents most similar to `query`.
    async fn similarity_search(&self, query: &str, top_k: usize) -> Vec<Document>;

    /// Returns documents whose `source` matches a known API name
    /// exactly, for "show me the reference doc for this sink" lookups.
    async fn search_by_api(&self, api_name: &str) -> Vec<Document>;
}
