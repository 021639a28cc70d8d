use std::fs;
use std::path::Path;

use tree_sitter::{Parser, Tree};

use crate::error::ParseError;

/// Thin wrapper around a tree-sitter `Parser` configured for C.
///
/// One `CParser` is built per worker rather than shared, since
/// `tree_sitter::Parser` is not `Sync`.
pub struct CParser {
    parser: Parser,
}

impl CParser {
    /// Builds a parser with the C grammar loaded.
    ///
    /// # Errors
    /// Returns [`ParseError::GrammarLoad`] if the grammar fails to load,
    /// which should only happen on an ABI mismatch between the
    /// `tree-sitter` and `tree-sitter-c` crate versions.
    pub fn new() -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .map_err(|err| ParseError::GrammarLoad(err.to_string()))?;
        Ok(Self { parser })
    }

    /// Parses a single C source file from disk.
    ///
    /// # Errors
    /// Returns [`ParseError::InvalidUtf8`] if the file is not valid
    /// UTF-8, or [`ParseError::NoTree`] if tree-sitter returns no tree
    /// at all (an internal tree-sitter failure mode, not a syntax error
    /// — malformed C still produces a tree with ERROR nodes).
    pub fn parse_file(&mut self, path: &Path) -> Result<(String, Tree), ParseError> {
        let source =
            fs::read_to_string(path).map_err(|_| ParseError::InvalidUtf8(path.to_path_buf()))?;
        let tree = self
            .parser
            .parse(&source, None)
            .ok_or_else(|| ParseError::NoTree(path.to_path_buf()))?;
        Ok((source, tree))
    }
}
