//! Shared CLI option structs, used by the `optee-taint-cli` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Static taint analysis for OP-TEE Trusted Applications.
#[derive(Debug, Parser)]
#[command(name = "optee-taint", version, about)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full taint-analysis pipeline against one or more TA projects.
    Analyze(AnalyzeArgs),
    /// Manage the LLM provider configuration.
    Configure(ConfigureArgs),
}

/// Arguments for `analyze`.
#[derive(Debug, clap::Args)]
pub struct AnalyzeArgs {
    /// Root of a TA project to analyze (must contain a `ta/` directory).
    /// Repeatable: each is run as an independent, sequential analysis.
    #[arg(short = 'p', long = "project", required = true)]
    pub projects: Vec<PathBuf>,
    /// Override the call-graph backward-traversal depth bound.
    #[arg(long)]
    pub max_depth: Option<usize>,
    /// Skip the rule-table short-circuit in P3 and force every sink
    /// candidate through an LLM call.
    #[arg(long)]
    pub llm_only: bool,
    /// Enable retrieval-augmented context from the configured RAG corpus.
    #[arg(long)]
    pub rag: bool,
    /// Treat OP-TEE debug/trace macros as sink candidates instead of
    /// excluding them by default.
    #[arg(long)]
    pub include_debug_macros: bool,
    /// Skip P0's stale `*.d` dependency-file cleanup.
    #[arg(long)]
    pub skip_clean: bool,
    /// Emit debug-level logging in addition to info-level.
    #[arg(long, short = 'v')]
    pub verbose: bool,
}

/// Arguments for `configure`: a nested subcommand group over
/// `optee-taint.toml`, not a direct flag set.
#[derive(Debug, clap::Args)]
pub struct ConfigureArgs {
    /// Project root the configuration file lives in.
    #[arg(long, default_value = ".")]
    pub project_root: PathBuf,
    /// Which configuration action to take.
    #[command(subcommand)]
    pub action: ConfigureAction,
}

/// Nested actions under `configure`.
#[derive(Debug, Subcommand)]
pub enum ConfigureAction {
    /// Print the current configuration, redacting the API key value.
    Status,
    /// Send a trivial chat-completion request to confirm the
    /// configured endpoint and credentials work.
    Test,
    /// Write one or more provider settings, creating the config file
    /// if it doesn't yet exist.
    Set(SetArgs),
    /// Print the configuration file as TOML to stdout.
    Export,
    /// Overwrite the configuration file from a TOML file on disk.
    Import {
        /// Path to the TOML file to import.
        path: PathBuf,
    },
}

/// Arguments for `configure set`.
#[derive(Debug, clap::Args)]
pub struct SetArgs {
    /// Provider preset to apply before any individual overrides below
    /// (`openai`, `anthropic`, `ollama`, or any other name — only
    /// changes `llm_api_key_env`'s default naming convention).
    pub provider: Option<String>,
    /// LLM chat-completions endpoint URL.
    #[arg(long)]
    pub llm_endpoint: Option<String>,
    /// LLM model identifier.
    #[arg(long)]
    pub llm_model: Option<String>,
    /// Name of the environment variable holding the API key.
    #[arg(long)]
    pub llm_api_key_env: Option<String>,
}
