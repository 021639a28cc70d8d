//! Command-line interface entry point for `optee-taint`.

use anyhow::{Context, Result};
use clap::Parser;
use optee_taint::cli::{AnalyzeArgs, Cli, Command, ConfigureAction, ConfigureArgs, SetArgs};
use optee_taint::config::Config;
use optee_taint::llm::{ChatMessage, LlmClient};
use optee_taint::pipeline::{Pipeline, RunOptions};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(matches!(&cli.command, Command::Analyze(args) if args.verbose));

    match cli.command {
        Command::Analyze(args) => run_analyze(args).await,
        Command::Configure(args) => run_configure(args).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .init();
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let options = RunOptions {
        llm_only: args.llm_only,
        use_rag: args.rag,
        include_debug_macros: args.include_debug_macros,
        skip_clean: args.skip_clean,
    };

    let mut total = 0;
    let mut total_confirmed = 0;
    for project_root in &args.projects {
        let mut config = Config::load(project_root)
            .with_context(|| format!("loading config for {}", project_root.display()))?;
        if let Some(max_depth) = args.max_depth {
            config.max_depth = max_depth;
        }

        let pipeline = Pipeline::new(config).context("constructing pipeline")?;
        let findings = pipeline.run(project_root, options).await?;

        let confirmed = findings
            .iter()
            .filter(|f| f.vulnerability.decision == optee_taint::model::Decision::Yes)
            .count();
        println!("{}: {} findings, {confirmed} confirmed", project_root.display(), findings.len());
        total += findings.len();
        total_confirmed += confirmed;
    }

    if args.projects.len() > 1 {
        println!("total: {total} findings, {total_confirmed} confirmed across {} projects", args.projects.len());
    }
    Ok(())
}

async fn run_configure(args: ConfigureArgs) -> Result<()> {
    match args.action {
        ConfigureAction::Status => configure_status(&args.project_root),
        ConfigureAction::Test => configure_test(&args.project_root).await,
        ConfigureAction::Set(set_args) => configure_set(&args.project_root, set_args),
        ConfigureAction::Export => configure_export(&args.project_root),
        ConfigureAction::Import { path } => configure_import(&args.project_root, &path),
    }
}

fn configure_status(project_root: &std::path::Path) -> Result<()> {
    let config = Config::load(project_root).with_context(|| format!("loading config for {}", project_root.display()))?;
    let key_present = config.llm.api_key().is_ok();
    println!("endpoint: {}", config.llm.endpoint);
    println!("model: {}", config.llm.model);
    println!("api_key_env: {} (set: {key_present})", config.llm.api_key_env);
    println!("rag: {}", if config.rag.is_some() { "configured" } else { "not configured" });
    Ok(())
}

async fn configure_test(project_root: &std::path::Path) -> Result<()> {
    let config = Config::load(project_root).with_context(|| format!("loading config for {}", project_root.display()))?;
    let pipeline_client = Pipeline::new(config).context("constructing pipeline")?;
    let response = pipeline_client
        .client()
        .chat_completion(&[ChatMessage::user("Respond with the single word: ok")])
        .await
        .context("test request to configured LLM endpoint failed")?;
    println!("endpoint responded: {}", response.trim());
    Ok(())
}

fn configure_set(project_root: &std::path::Path, args: SetArgs) -> Result<()> {
    let mut config = Config::load(project_root).with_context(|| format!("loading config for {}", project_root.display()))?;

    if let Some(provider) = &args.provider {
        apply_provider_preset(&mut config, provider);
    }
    if let Some(endpoint) = args.llm_endpoint {
        config.llm.endpoint = endpoint;
    }
    if let Some(model) = args.llm_model {
        config.llm.model = model;
    }
    if let Some(api_key_env) = args.llm_api_key_env {
        config.llm.api_key_env = api_key_env;
    }

    config
        .save(project_root)
        .with_context(|| format!("writing config to {}", project_root.display()))?;
    println!("wrote {}/optee-taint.toml", project_root.display());
    Ok(())
}

fn apply_provider_preset(config: &mut optee_taint::config::Config, provider: &str) {
    match provider {
        "openai" => {
            config.llm.endpoint = "https://api.openai.com/v1/chat/completions".to_owned();
            config.llm.model = "gpt-4o-mini".to_owned();
            config.llm.api_key_env = "OPENAI_API_KEY".to_owned();
        }
        "anthropic" => {
            config.llm.endpoint = "https://api.anthropic.com/v1/chat/completions".to_owned();
            config.llm.model = "claude-3-5-sonnet-latest".to_owned();
            config.llm.api_key_env = "ANTHROPIC_API_KEY".to_owned();
        }
        "ollama" => {
            config.llm.endpoint = "http://localhost:11434/v1/chat/completions".to_owned();
            config.llm.model = "llama3".to_owned();
            config.llm.api_key_env = "OLLAMA_API_KEY".to_owned();
        }
        other => {
            tracing::warn!(provider = other, "unrecognized provider preset, only explicit --llm-* overrides applied");
        }
    }
}

fn configure_export(project_root: &std::path::Path) -> Result<()> {
    let config = Config::load(project_root).with_context(|| format!("loading config for {}", project_root.display()))?;
    let text = toml::to_string_pretty(&config).context("serializing config")?;
    print!("{text}");
    Ok(())
}

fn configure_import(project_root: &std::path::Path, path: &std::path::Path) -> Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: Config = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    config
        .save(project_root)
        .with_context(|| format!("writing config to {}", project_root.display()))?;
    println!("imported {} into {}/optee-taint.toml", path.display(), project_root.display());
    Ok(())
}
