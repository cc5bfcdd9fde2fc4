use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};

use memoria_agent::{ChatRequest, ChatResponse, LlmProvider, ProviderError};
use memoria_compaction::{CompactionService, Summarizer};
use memoria_core::MemoriaConfig;
use memoria_scheduler::SchedulerEngine;
use memoria_store::ConversationStore;

mod app;
mod http;

/// Conversation store with automatic history compaction.
#[derive(Parser, Debug)]
#[command(name = "memoria-gateway", version)]
struct Args {
    /// Path to memoria.toml (falls back to $MEMORIA_CONFIG, then ~/.memoria/memoria.toml).
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "memoria_gateway=info,memoria_compaction=info,memoria_scheduler=info,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let args = Args::parse();
    let config_path = args.config.or_else(|| std::env::var("MEMORIA_CONFIG").ok());
    let config = MemoriaConfig::load(config_path.as_deref())?;

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening SQLite database");

    let db = rusqlite::Connection::open(db_path)?;
    db.execute_batch("PRAGMA journal_mode=WAL;")?;
    let store = Arc::new(ConversationStore::new(db)?);
    info!(conversations = store.count()?, "conversation store ready");

    let provider = build_provider(&config);
    let summarizer = Summarizer::new(provider, &config.compression);
    let compaction = Arc::new(CompactionService::new(
        store,
        summarizer,
        config.compression.clone(),
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    if config.compression.enabled {
        let engine = SchedulerEngine::new(
            Arc::clone(&compaction),
            config.compression.schedule.clone(),
        )?;
        tokio::spawn(engine.run(shutdown_rx));
    } else {
        info!("compaction disabled, scheduler not started");
    }

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, compaction));
    let router = app::build_router(state);

    info!("memoria gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    // signal scheduler to stop
    let _ = shutdown_tx.send(true);
    Ok(())
}

/// Build the summarization provider chain from config.
///
/// Priority order:
///   1. providers.openai (any OpenAI-compatible endpoint)
///   2. providers.ollama
///   3. OPENAI_API_KEY env var (only when nothing is configured)
///
/// Several slots are wrapped in a ProviderRouter for automatic failover.
/// With none at all every summary degrades to the raw transcript.
fn build_provider(config: &MemoriaConfig) -> Arc<dyn LlmProvider> {
    use memoria_agent::router::{ProviderRouter, ProviderSlot};

    let mut slots: Vec<ProviderSlot> = Vec::new();

    if let Some(ref openai) = config.providers.openai {
        info!(
            "LLM provider slot[{}]: OpenAI-compatible ({}{})",
            slots.len(),
            openai.base_url,
            openai.chat_path
        );
        slots.push(ProviderSlot::new(
            Box::new(memoria_agent::openai::OpenAiProvider::with_path(
                openai.api_key.clone(),
                openai.base_url.clone(),
                openai.chat_path.clone(),
            )),
            1,
        ));
    }

    if let Some(ref ollama) = config.providers.ollama {
        info!(
            "LLM provider slot[{}]: Ollama ({})",
            slots.len(),
            ollama.base_url
        );
        slots.push(ProviderSlot::new(
            Box::new(memoria_agent::ollama::OllamaProvider::new(Some(
                ollama.base_url.clone(),
            ))),
            0,
        ));
    }

    if slots.is_empty() {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            info!("LLM provider: OpenAI (from env)");
            slots.push(ProviderSlot::new(
                Box::new(memoria_agent::openai::OpenAiProvider::new(key, None)),
                1,
            ));
        }
    }

    if slots.len() == 1 {
        return Arc::from(slots.remove(0).provider);
    }
    match ProviderRouter::new(slots) {
        Some(router) => {
            info!(
                "ProviderRouter: {} slots configured (automatic failover)",
                router.slot_count()
            );
            Arc::new(router)
        }
        None => {
            warn!("No LLM provider configured, summaries will fall back to raw transcripts");
            Arc::new(NullProvider)
        }
    }
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}

/// Placeholder provider when no backend is configured.
struct NullProvider;

#[async_trait::async_trait]
impl LlmProvider for NullProvider {
    fn name(&self) -> &str {
        "null"
    }
    async fn send(&self, _req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        Err(ProviderError::Unavailable(
            "no LLM provider configured, set providers.openai or providers.ollama in memoria.toml"
                .into(),
        ))
    }
}
