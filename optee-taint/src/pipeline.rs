//! Orchestrates the six phases against one TA project.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::llm::{HttpLlmClient, LlmClient};
use crate::model::Finding;
use crate::phases::p3_sinks::P3Options;
use crate::phases::{p0_builddb, p12_classify, p3_sinks, p4_flows, p5_taint, p6_report};
use crate::rag::{InMemoryVectorStore, PlainTextDocumentLoader, VectorStore};
use crate::ratelimit::RateLimiter;
use crate::utils::{write_json, RunPaths};

/// Per-run toggles that don't belong in the persisted [`Config`]
/// (spec.md §8's CLI flags): these vary run to run, not project to
/// project.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip the rule-table short-circuit in P3 and force every
    /// candidate through an LLM call.
    pub llm_only: bool,
    /// Build and query a [`crate::rag::VectorStore`] from
    /// `config.rag`, if configured.
    pub use_rag: bool,
    /// Treat OP-TEE debug/trace macros as sink candidates instead of
    /// excluding them by default.
    pub include_debug_macros: bool,
    /// Skip P0's stale `*.d` dependency-file cleanup.
    pub skip_clean: bool,
}

/// Drives a full run over `project_root`, writing artifacts under the
/// project's results directory and returning the merged findings.
pub struct Pipeline {
    config: Config,
    client: Arc<dyn LlmClient>,
}

impl Pipeline {
    /// Builds a pipeline against a real HTTP LLM endpoint configured by
    /// `config.llm`.
    ///
    /// # Errors
    /// Returns an error if the configured API key environment variable
    /// is unset.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let api_key = config.llm.api_key()?;
        let client = HttpLlmClient::new(
            config.llm.endpoint.clone(),
            api_key,
            config.llm.model.clone(),
            config.llm.timeout(),
        );
        Ok(Self {
            config,
            client: Arc::new(client),
        })
    }

    /// Builds a pipeline against an arbitrary [`LlmClient`], for tests
    /// and for integrators supplying their own provider.
    #[must_use]
    pub fn with_client(config: Config, client: Arc<dyn LlmClient>) -> Self {
        Self { config, client }
    }

    /// The configured LLM client, for callers that need to issue a
    /// one-off request outside the full pipeline (e.g. `configure test`).
    #[must_use]
    pub fn client(&self) -> &dyn LlmClient {
        self.client.as_ref()
    }

    /// Runs the full pipeline against `project_root`, returning the
    /// final merged findings set.
    ///
    /// # Errors
    /// Returns an error only for the catastrophic failures named in
    /// [`crate::error::PipelineError`]; every per-phase recoverable
    /// failure is logged and the phase simply contributes less.
    pub async fn run(&self, project_root: &Path, options: RunOptions) -> anyhow::Result<Vec<Finding>> {
        info!(project = %project_root.display(), "starting run");
        let started = std::time::Instant::now();
        let paths = RunPaths::new(project_root);
        paths.ensure()?;

        let entries = match p0_builddb::provision(project_root, &self.config.devkit, options.skip_clean) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(%err, "build database provisioning failed, continuing with no entries");
                Vec::new()
            }
        };
        info!(entries = entries.len(), "P0 build-db complete");

        let declarations = p12_classify::classify(&entries);
        info!(declarations = declarations.len(), "P1-2 classification complete");
        if let Err(err) = write_json(&paths.phase12_json(), &declarations) {
            warn!(%err, "failed to write phase12.json");
        }

        let rag_store = self.build_rag_store(&options).await;
        let rag: Option<&dyn VectorStore> = rag_store.as_deref();

        let limiter = RateLimiter::new(std::time::Duration::from_millis(self.config.min_call_interval_ms));
        let p3_options = P3Options {
            llm_only: options.llm_only,
            include_debug_macros: options.include_debug_macros,
        };
        let sinks = p3_sinks::identify_sinks(&declarations, self.client.as_ref(), &limiter, rag, p3_options).await;
        info!(sinks = sinks.len(), "P3 sink identification complete");
        if let Err(err) = write_json(&paths.sinks_json(), &sinks) {
            warn!(%err, "failed to write sinks.json");
        }

        let flows = p4_flows::generate_candidate_flows(&declarations, &sinks, self.config.max_depth);
        info!(flows = flows.len(), "P4 candidate flow generation complete");
        if let Err(err) = write_json(&paths.candidate_flows_json(), &flows) {
            warn!(%err, "failed to write candidate_flows.json");
        }

        let cache = p5_taint::PrefixCache::new(self.config.prefix_cache_capacity);
        let findings = p5_taint::analyze(&flows, self.client.as_ref(), &limiter, &cache, rag).await;
        info!(findings = findings.len(), "P5 taint analysis complete");

        if let Err(err) = p6_report::render(&findings, &paths) {
            warn!(%err, "P6 report rendering failed");
        }

        if let Err(err) = std::fs::write(paths.time_txt(), format!("{:.3}s\n", started.elapsed().as_secs_f64())) {
            warn!(%err, "failed to write time.txt");
        }

        Ok(findings)
    }

    /// Builds and indexes a [`VectorStore`] from `config.rag`, if the
    /// caller asked for RAG and a corpus is configured. Returns `None`
    /// in every other case so callers can treat "RAG unavailable" and
    /// "RAG disabled" identically.
    async fn build_rag_store(&self, options: &RunOptions) -> Option<Arc<dyn VectorStore>> {
        if !options.use_rag {
            return None;
        }
        let rag_config = self.config.rag.as_ref()?;
        let loader = PlainTextDocumentLoader::default();
        let mut documents = Vec::new();
        let corpus_files = crate::utils::discover_files_with_ext(&rag_config.corpus_dir, "txt");
        for file in corpus_files {
            match loader.load_file(&file) {
                Ok(mut docs) => documents.append(&mut docs),
                Err(err) => warn!(file = %file.display(), %err, "failed to load RAG corpus file"),
            }
        }
        let store = InMemoryVectorStore::new();
        store.build_index(documents).await;
        Some(Arc::new(store))
    }
}
