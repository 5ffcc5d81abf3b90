//! Call Distribution Server
//!
//! Runs the distribution engine on a SQLite agent store and exposes it over
//! HTTP:
//! 1. Loads configuration (TOML file plus command-line overrides)
//! 2. Optionally provisions agents from a seed file
//! 3. Loads the agent registry and serves the JSON API until Ctrl-C

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{error, info};

use rvoip_call_distribution::{
    api,
    logging,
    prelude::*,
    store::sqlite::AgentProfile,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Call distribution engine with HTTP API", long_about = None)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "CALL_DISTRIBUTION_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides api.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Database URL, overrides database.url
    #[arg(long, env = "CALL_DISTRIBUTION_DATABASE_URL")]
    database_url: Option<String>,

    /// Agent seed file (TOML, one [[agent]] table per agent)
    #[arg(long)]
    agents: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct SeedFile {
    #[serde(default)]
    agent: Vec<SeedAgent>,
}

#[derive(Debug, Deserialize)]
struct SeedAgent {
    id: String,
    name: Option<String>,
    #[serde(default)]
    skills: Vec<String>,
    #[serde(default)]
    priority: i64,
    #[serde(default = "default_seed_status")]
    status: String,
}

fn default_seed_status() -> String {
    AgentStatus::Offline.to_string()
}

async fn seed_agents(store: &SqliteAgentStore, path: &Path, config: &DistributionConfig) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let seed: SeedFile = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    for agent in seed.agent {
        let skills = SkillSet::parse(&agent.skills, config.agents.max_skill_len)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("agent {}", agent.id))?;
        let status = agent
            .status
            .parse::<AgentStatus>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("agent {}", agent.id))?;

        store
            .upsert_agent(&AgentProfile {
                agent_id: AgentId::from(agent.id.as_str()),
                display_name: agent.name.unwrap_or_else(|| agent.id.clone()),
                skills,
                priority: Priority::clamped(agent.priority, config.agents.min_priority, config.agents.max_priority),
                status,
            })
            .await?;
        info!("👤 Provisioned agent {} ({})", agent.id, status);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => DistributionConfig::load(path)?,
        None => DistributionConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.api.bind_address = bind;
    }
    if let Some(url) = args.database_url {
        config.database.url = url;
    }
    config.validate()?;

    logging::init(&config.general.log_filter);

    info!("🏢 Starting Call Distribution Server");
    info!("⚙️  Server configuration:");
    info!("   Database: {}", config.database.url);
    info!("   Retry interval: {:?}", config.queue.retry_interval());
    info!("   Error backoff: {:?}", config.queue.error_backoff());

    let store = SqliteAgentStore::connect(&config.database).await?;
    if let Some(path) = &args.agents {
        seed_agents(&store, path, &config).await?;
    }

    let notifier = BroadcastNotifier::default();
    let bind_address = config.api.bind_address.clone();

    let engine = CallDistributionEngine::new(config, Arc::new(store), Arc::new(notifier));
    engine.start().await?;

    let listener = TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {}", bind_address))?;
    info!("🚀 HTTP API listening on {}", listener.local_addr()?);

    let app = api::router(engine.clone());
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await;

    engine.shutdown();

    match served {
        Ok(()) => info!("🏁 Server stopped"),
        Err(e) => error!("Server error: {}", e),
    }
    Ok(())
}
