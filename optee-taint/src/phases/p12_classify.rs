//! P1-2: function classifier.
//!
//! Parses every compiled translation unit and builds the flat list of
//! [`Declaration`]s later phases index into a call graph. Parse
//! failures are per-file and never abort the phase (spec.md §7).

use tracing::warn;

use crate::cparse::{extract_declarations, CParser};
use crate::model::{CompileEntry, Declaration};

/// Parses every entry's source file and extracts its declarations.
#[must_use]
pub fn classify(entries: &[CompileEntry]) -> Vec<Declaration> {
    let mut parser = match CParser::new() {
        Ok(parser) => parser,
        Err(err) => {
            warn!(%err, "failed to initialize C parser, classifier producing no declarations");
            return Vec::new();
        }
    };

    let mut declarations = Vec::new();
    for entry in entries {
        match parser.parse_file(&entry.file) {
            Ok((source, tree)) => {
                declarations.extend(extract_declarations(&entry.file, &source, &tree));
            }
            Err(err) => {
                warn!(file = %entry.file.display(), %err, "skipping unparsable translation unit");
            }
        }
    }
    declarations
}
