//! Typed errors for each pipeline subsystem.
//!
//! Each phase gets its own `thiserror` enum (mirrors the teacher's
//! `SemanticError`/`CstError` split); `anyhow` is reserved for the
//! orchestration boundary in `pipeline.rs`.

use std::path::PathBuf;

/// Errors from the build-database provisioner (P0).
///
/// Per spec.md §7, build failures are never fatal to the pipeline —
/// this error type exists for diagnostics and tests, not for aborting.
#[derive(Debug, thiserror::Error)]
pub enum BuildDbError {
    /// No `ta/` directory was found under the project root.
    #[error("no ta/ directory under project root {0}")]
    MissingTaDir(PathBuf),
    /// A fallback build command could not be spawned at all.
    #[error("failed to spawn `{command}`: {source}")]
    SpawnFailed {
        /// The command that was attempted.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The produced `compile_commands.json` could not be parsed as JSON.
    #[error("malformed compile_commands.json at {path}: {source}")]
    MalformedDatabase {
        /// Path to the malformed file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors from C AST parsing (P1-2, P4).
///
/// Per spec.md §7, parse failures are per-translation-unit and never
/// abort the phase.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// tree-sitter failed to load the C grammar.
    #[error("failed to load tree-sitter-c grammar: {0}")]
    GrammarLoad(String),
    /// The parser produced no tree at all (should not happen for valid UTF-8).
    #[error("tree-sitter produced no parse tree for {0}")]
    NoTree(PathBuf),
    /// The source file was not valid UTF-8.
    #[error("file {0} is not valid UTF-8")]
    InvalidUtf8(PathBuf),
}

/// Classification of an LLM call failure, per spec.md §7's taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LlmErrorKind {
    /// The call exceeded its per-call timeout.
    Timeout,
    /// The provider signalled rate limiting.
    RateLimit,
    /// The prompt or expected completion exceeded the model's context window.
    TokenLimit,
    /// Invalid or missing API credentials.
    AuthError,
    /// The provider's content filter rejected the request or response.
    ContentFilter,
    /// The provider returned a 5xx-class error.
    ServerError,
    /// A transport-level network failure (DNS, connection reset, TLS, ...).
    NetworkError,
    /// Anything that does not fit the other categories.
    Unknown,
}

impl LlmErrorKind {
    /// Whether this error kind should ever be retried.
    ///
    /// `AUTH_ERROR`, `TOKEN_LIMIT`, and `CONTENT_FILTER` are non-retriable
    /// and fatal to the current call (spec.md §7).
    #[must_use]
    pub fn is_retriable(self) -> bool {
        !matches!(
            self,
            Self::AuthError | Self::TokenLimit | Self::ContentFilter
        )
    }
}

/// An error raised by an [`crate::llm::LlmClient`] implementation.
#[derive(Debug, thiserror::Error)]
#[error("llm call failed ({kind:?}): {message}")]
pub struct LlmError {
    /// Taxonomy classification used to decide retry behavior.
    pub kind: LlmErrorKind,
    /// Human-readable detail, preserved for the fatal-error diagnostic report.
    pub message: String,
}

impl LlmError {
    /// Builds a new classified LLM error.
    #[must_use]
    pub fn new(kind: LlmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Top-level pipeline error.
///
/// Per spec.md §7, only invariant violations in the build-DB provisioner
/// or catastrophic filesystem errors should reach this type and abort a
/// TA run; everything else is contained at a smaller scope and
/// surfaces as a skipped sink, an incomplete flow, or a missing artifact.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The project directory itself could not be read.
    #[error("cannot read project directory {path}: {source}")]
    ProjectUnreadable {
        /// The project path that failed to open.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The results directory could not be created or written to.
    #[error("cannot write results to {path}: {source}")]
    ResultsUnwritable {
        /// The results directory path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
