use std::path::Path;

use super::Document;

/// Splits plain-text reference material (API docs, prior-CVE
/// writeups) into fixed-size overlapping chunks suitable for indexing.
pub struct PlainTextDocumentLoader {
    chunk_size: usize,
    overlap: usize,
}

impl PlainTextDocumentLoader {
    /// Builds a loader with the given chunk size and overlap, both in
    /// characters.
    #[must_use]
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self { chunk_size, overlap }
    }

    /// Loads and chunks a single text file.
    ///
    /// # Errors
    /// Propagates the underlying [`std::io::Error`] if the file cannot
    /// be read.
    pub fn load_file(&self, path: &Path) -> std::io::Result<Vec<Document>> {
        let text = std::fs::read_to_string(path)?;
        let source = path.display().to_string();
        Ok(self.chunk(&source, &text))
    }

    fn chunk(&self, source: &str, text: &str) -> Vec<Document> {
        if text.is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = text.chars().collect();
        let stride = self.chunk_size.saturating_sub(self.overlap).max(1);
        let mut documents = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            documents.push(Document {
                source: source.to_owned(),
                text: chars[start..end].iter().collect(),
            });
            if end == chars.len() {
                break;
            }
            start += stride;
        }
        documents
    }
}

impl Default for PlainTextDocumentLoader {
    fn default() -> Self {
        Self::new(800, 100)
    }
}
