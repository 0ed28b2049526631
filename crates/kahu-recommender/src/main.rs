mod classifier;
mod config;
mod error;
mod filter;
mod interpreter;
mod model;
mod persona;
mod pipeline;
mod sanitizer;
mod seed;
mod server;
mod store;
mod summary;
mod vocab;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kahu_common::conversation::ConversationStore;
use kahu_common::openai::{OpenAiClient, OpenAiClientConfig};
use kahu_common::redis::RedisCache;

use config::Config;
use interpreter::QueryInterpreter;
use pipeline::RecommendationPipeline;
use seed::SeedSet;
use server::KahuRecommenderServer;
use store::{CandidateStore, MemoryStore, RedisDocumentStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting kahu-recommender MCP server");

    let config = Config::from_env()?;
    let openai_config = OpenAiClientConfig::from_env();
    info!(
        base_url = %openai_config.base_url,
        model = %config.model,
        timeout_ms = openai_config.default_timeout.as_millis(),
        redis = config.redis_url.is_some(),
        "configuration loaded"
    );
    let timeout = openai_config.default_timeout;
    let openai = Arc::new(OpenAiClient::new(openai_config, config.model.clone())?);

    let seed = SeedSet::load(config.seed_path.as_deref())?;

    let redis_cache = RedisCache::new(config.redis_url.as_deref());
    let store: Arc<dyn CandidateStore> = if redis_cache.is_available().await {
        info!("redis connected, serving documents from redis");
        let store = RedisDocumentStore::new(redis_cache.clone());
        store.initialize(&seed).await?;
        Arc::new(store)
    } else {
        info!("redis unavailable, serving seed set from memory");
        Arc::new(MemoryStore::new(seed))
    };
    let convos = ConversationStore::new(redis_cache, config.convo_ttl_secs);

    let interpreter = QueryInterpreter::new(openai, timeout);
    let pipeline = Arc::new(RecommendationPipeline::new(store, interpreter));
    let server = KahuRecommenderServer::new(pipeline, convos);

    info!("MCP server ready, serving on stdio");
    let service = server.serve(stdio()).await.inspect_err(|e| {
        tracing::error!(error = %e, "MCP server error");
    })?;

    service.waiting().await?;
    info!("MCP server shut down");
    Ok(())
}
