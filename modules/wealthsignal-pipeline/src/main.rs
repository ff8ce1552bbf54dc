use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use wealthsignal_common::{Config, Environment, SourceConfig};
use wealthsignal_pipeline::infra::{
    BrowserlessFetcher, ClaudeIntelligence, Embedder, HttpFetcher, NoSearch, SerperSearcher,
    WikipediaEncyclopedia,
};
use wealthsignal_pipeline::notify::{
    NoopSupervisor, NotificationChannel, ResendEmail, SlackSupervisor, SupervisorBackend,
    WebhookPush,
};
use wealthsignal_pipeline::traits::{PageFetcher, WebSearcher};
use wealthsignal_pipeline::{CommitStatus, Pipeline, PipelineDeps, RunOptions};
use wealthsignal_store::{DocumentStore, MemoryStore, PgStore, VectorIndex};

#[derive(Debug, Parser)]
#[command(name = "wealthsignal", about = "Run the news intelligence pipeline once")]
struct Cli {
    /// Reprocess links that are already stored.
    #[arg(long)]
    refresh: bool,

    /// Only scrape this source (name or key). Repeatable.
    #[arg(long = "source")]
    sources: Vec<String>,

    /// Use the in-memory store and skip all sends.
    #[arg(long)]
    dry_run: bool,

    /// JSON array of source configs to seed the in-memory store with.
    #[arg(long)]
    sources_file: Option<PathBuf>,
}

fn load_sources_file(path: &PathBuf) -> Result<Vec<SourceConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("wealthsignal=info".parse()?))
        .init();

    let cli = Cli::parse();
    info!("WealthSignal pipeline starting...");

    let mut config = Config::from_env()?;
    if cli.dry_run {
        config.environment = Environment::Development;
    }
    config.log_redacted();

    // Storage: Postgres when configured, otherwise an in-memory store
    let (store, vectors): (Arc<dyn DocumentStore>, Arc<dyn VectorIndex>) =
        match (&config.database_url, cli.dry_run) {
            (Some(url), false) => {
                let pg = Arc::new(PgStore::connect(url).await?);
                pg.migrate().await?;
                (pg.clone(), pg)
            }
            _ => {
                let seed = match &cli.sources_file {
                    Some(path) => load_sources_file(path)?,
                    None => Vec::new(),
                };
                info!(sources = seed.len(), "Using in-memory store");
                let memory = Arc::new(MemoryStore::new().with_sources(seed));
                (memory.clone(), memory)
            }
        };

    let fetcher: Arc<dyn PageFetcher> = match &config.browserless_url {
        Some(url) => Arc::new(BrowserlessFetcher::new(url, config.browserless_token.as_deref())?),
        None => Arc::new(HttpFetcher::new()?),
    };
    let searcher: Arc<dyn WebSearcher> = match &config.serper_api_key {
        Some(key) => Arc::new(SerperSearcher::new(key)?),
        None => {
            warn!("SERPER_API_KEY not set, verification and disambiguation disabled");
            Arc::new(NoSearch)
        }
    };

    let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
    if let Some(key) = &config.resend_api_key {
        channels.push(Arc::new(ResendEmail::new(key.clone(), config.email_from.clone())));
    }
    if let Some(url) = &config.push_webhook_url {
        channels.push(Arc::new(WebhookPush::new(url.clone())));
    }
    let supervisor: Arc<dyn SupervisorBackend> = match &config.slack_webhook_url {
        Some(url) => Arc::new(SlackSupervisor::new(url.clone())),
        None => Arc::new(NoopSupervisor),
    };

    let deps = PipelineDeps::builder()
        .store(store)
        .vectors(vectors)
        .fetcher(fetcher)
        .searcher(searcher)
        .intelligence(Arc::new(ClaudeIntelligence::new(
            &config.anthropic_api_key,
            &config.anthropic_model,
        )))
        .embedder(Arc::new(Embedder::new(&config.voyage_api_key)))
        .encyclopedia(Arc::new(WikipediaEncyclopedia::new()?))
        .channels(channels)
        .supervisor(supervisor)
        .environment(config.environment)
        .concurrency(config.concurrency)
        .build();

    let pipeline = Pipeline::new(
        deps,
        RunOptions {
            refresh: cli.refresh,
            source_filter: cli.sources,
        },
    );

    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight work");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let outcome = pipeline.run().await?;
    info!(
        run_id = %outcome.run_id,
        commit = outcome.commit.as_str(),
        notified = outcome.notified,
        "Pipeline run complete"
    );
    match outcome.commit {
        CommitStatus::Failed => {
            warn!(run_id = %outcome.run_id, "Commit incomplete, remaining writes retry next run")
        }
        CommitStatus::Cancelled => {
            warn!(run_id = %outcome.run_id, "Run cancelled before commit, nothing was notified")
        }
        CommitStatus::NothingNew | CommitStatus::Committed => {}
    }
    Ok(())
}
