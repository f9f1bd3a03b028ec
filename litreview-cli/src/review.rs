//! The default command: run one literature review and emit the result.

use litreview_core::config::ReviewConfig;
use litreview_core::embeddings::CachedEmbedder;
use litreview_core::research::output::write_report;
use litreview_core::research::stages::quality::Route;
use litreview_core::{
    GenerationOptions, PipelineObserver, PipelineState, ResponseCache, ReviewEngine, Stage,
    StageContext, create_embedder, create_provider,
};
use litreview_tools::{HttpFetcher, create_search_backend};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// LLM providers that run locally and take no credential.
const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm", "lmstudio"];

/// Environment variables the configured providers need but `lookup` cannot supply.
pub fn missing_credentials(
    config: &ReviewConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Vec<String> {
    let mut required = Vec::new();
    if !KEYLESS_PROVIDERS.contains(&config.llm.provider.as_str()) {
        required.push(config.llm.api_key_env.clone());
    }
    if config.embedding.requires_api_key() {
        required.push(config.embedding.api_key_env.clone());
    }
    if let Some(var) = config.search.key_env() {
        required.push(var);
    }

    let mut missing: Vec<String> = Vec::new();
    for var in required {
        let present = lookup(&var).is_some_and(|v| !v.trim().is_empty());
        if !present && !missing.contains(&var) {
            missing.push(var);
        }
    }
    missing
}

/// Setup instructions printed when credentials are missing.
pub fn remediation_message(missing: &[String]) -> String {
    let mut msg = String::from("missing required environment variables:\n");
    for var in missing {
        msg.push_str(&format!("  - {}\n", var));
    }
    msg.push_str("\nCreate a .env file in the working directory containing:\n\n");
    for var in missing {
        if var == "OPENAI_API_KEY" {
            msg.push_str("  OPENAI_API_KEY=sk-your-key-here\n");
        } else {
            msg.push_str(&format!("  {}=your-key-here\n", var));
        }
    }
    msg.push_str("  OPENAI_MODEL=gpt-4o-mini   # optional\n");
    msg
}

/// Fail with the remediation text when any credential is missing.
pub fn require_credentials(
    config: &ReviewConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let missing = missing_credentials(config, lookup);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!(remediation_message(&missing)))
    }
}

/// Prints stage progress to stderr.
struct ProgressObserver;

impl PipelineObserver for ProgressObserver {
    fn on_stage_start(&self, stage: Stage) {
        eprintln!("  -> {}", stage);
    }

    fn on_stage_complete(&self, stage: Stage, elapsed: Duration, state: &PipelineState) {
        let detail = match stage {
            Stage::Planner => format!("{} subtopics", state.subtopics.len()),
            Stage::Searcher => format!("{} urls", state.url_count()),
            Stage::Fetcher => format!("{} documents", state.documents.len()),
            Stage::ChunkEmbed => format!("{} chunks", state.chunks.len()),
            Stage::Summarizer => format!("{} summaries", state.summaries.len()),
            _ => String::new(),
        };
        eprintln!("     done in {:.1}s {}", elapsed.as_secs_f64(), detail);
    }

    fn on_route(&self, route: Route, retry_count: u32) {
        if route == Route::Retry {
            eprintln!("     too few documents, retrying search (attempt {})", retry_count + 1);
        }
    }
}

/// Build the collaborators from `config`, run the pipeline and emit the review.
pub async fn run(
    topic: &str,
    output: Option<&Path>,
    config: ReviewConfig,
    quiet: bool,
) -> anyhow::Result<()> {
    let llm = create_provider(&config.llm)?;
    let search = create_search_backend(&config.search)?;
    let fetcher = Arc::new(HttpFetcher::new(&config.fetch)?);
    let cache = ResponseCache::from_config(&config.cache);

    let mut embedder = create_embedder(&config.embedding)?;
    if let Some(cache) = &cache {
        embedder = Arc::new(CachedEmbedder::new(embedder, cache.clone()));
    }

    let mut ctx = StageContext::new(llm, search, fetcher)
        .with_embedder(embedder)
        .with_generation(GenerationOptions {
            temperature: config.llm.temperature,
            max_tokens: config.llm.max_tokens,
        })
        .with_fetch_concurrency(config.fetch.concurrency);
    if let Some(cache) = cache {
        ctx = ctx
            .with_index_path(cache.root().join("index").join("latest.json"))
            .with_cache(cache);
    }

    let mut engine = ReviewEngine::new(ctx);
    if !quiet {
        eprintln!("Reviewing: {}", topic);
        engine = engine.with_observer(Arc::new(ProgressObserver));
    }

    let state = engine.run(topic).await;
    let summary = state.summary();
    let review = state.final_review.clone().unwrap_or_default();

    if !quiet {
        eprintln!(
            "\nSubtopics: {} | URLs: {} | Documents: {} ({} placeholders) | Chunks: {} | Summaries: {} | Retries: {}",
            summary.subtopics,
            summary.urls,
            summary.documents,
            summary.placeholder_documents,
            summary.chunks,
            summary.summaries,
            summary.retries
        );
    }

    match output {
        Some(path) => {
            write_report(path, &state.topic, &review)
                .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path.display(), e))?;
            if !quiet {
                eprintln!("Review written to {}", path.display());
            }
        }
        None => {
            let rule = "=".repeat(60);
            println!("{}\n{}\n{}", rule, review.trim_end(), rule);
        }
    }
    Ok(())
}
