//! Layered configuration: defaults, then an optional `optee-taint.toml`
//! in the project root, then CLI flags, each overriding the last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_MAX_DEPTH, DEFAULT_MIN_CALL_INTERVAL_MS, DEFAULT_PREFIX_CACHE_CAPACITY,
};

/// Top-level configuration for a run, assembled by [`Config::load`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum call-graph backward-traversal depth (P4).
    pub max_depth: usize,
    /// Minimum milliseconds between LLM calls.
    pub min_call_interval_ms: u64,
    /// Capacity of the chain-prefix conversation cache.
    pub prefix_cache_capacity: usize,
    /// LLM provider settings.
    pub llm: LlmConfig,
    /// Optional retrieval-augmented context settings.
    pub rag: Option<RagConfig>,
    /// OP-TEE devkit locations used to synthesize compile arguments
    /// for source files no build strategy could recover.
    pub devkit: DevKitConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            min_call_interval_ms: DEFAULT_MIN_CALL_INTERVAL_MS,
            prefix_cache_capacity: DEFAULT_PREFIX_CACHE_CAPACITY,
            llm: LlmConfig::default(),
            rag: None,
            devkit: DevKitConfig::default(),
        }
    }
}

/// Locations P0's orphan-file synthesis needs when no build strategy
/// recovers a real compile command for a source file (spec.md §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DevKitConfig {
    /// Root of the OP-TEE TA devkit (`$TA_DEV_KIT_DIR`), providing the
    /// `include/` tree every TA source file compiles against.
    pub ta_dev_kit_dir: PathBuf,
    /// Extra system include directories beyond the devkit's own,
    /// appended as additional `-I` flags in declaration order.
    pub extra_include_dirs: Vec<PathBuf>,
}

impl Default for DevKitConfig {
    fn default() -> Self {
        Self {
            ta_dev_kit_dir: PathBuf::from("/opt/optee/export-ta_arm64"),
            extra_include_dirs: Vec::new(),
        }
    }
}

/// Settings for the generic HTTP LLM client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Full chat-completions endpoint URL.
    pub endpoint: String,
    /// Model identifier sent in every request.
    pub model: String,
    /// Environment variable name holding the API key (never stored in
    /// the config file itself).
    pub api_key_env: String,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            api_key_env: "OPTEE_TAINT_API_KEY".to_owned(),
            timeout_secs: 90,
        }
    }
}

impl LlmConfig {
    /// Reads the API key from `self.api_key_env`.
    ///
    /// # Errors
    /// Returns an error if the named environment variable is unset.
    pub fn api_key(&self) -> Result<String, std::env::VarError> {
        std::env::var(&self.api_key_env)
    }

    /// Timeout as a [`Duration`], clamped to the spec's 60-120s window.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(60, 120))
    }
}

/// Settings for optional retrieval-augmented context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Directory of plain-text reference documents to index at startup.
    pub corpus_dir: PathBuf,
    /// Number of documents to retrieve per query.
    pub top_k: usize,
}

impl Config {
    /// Loads configuration: defaults, overridden by `<project_root>/optee-taint.toml`
    /// if present.
    ///
    /// # Errors
    /// Returns an error if the config file exists but fails to parse.
    pub fn load(project_root: &Path) -> anyhow::Result<Self> {
        let path = project_root.join("optee-taint.toml");
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&text)?;
        Ok(config)
    }

    /// Writes this configuration to `<project_root>/optee-taint.toml`.
    ///
    /// # Errors
    /// Returns an error if serialization or the write itself fails.
    pub fn save(&self, project_root: &Path) -> anyhow::Result<()> {
        let text = toml::to_string_pretty(self)?;
        std::fs::write(project_root.join("optee-taint.toml"), text)?;
        Ok(())
    }
}
