use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use consensus::{AgentId, WorkItem, WorkKind};
use quorum_agents::{
    AgentConfig, AgentContext, CompletionClient, DrandBeacon, HttpCompletionClient, InMemoryQueue,
    LocalRandomness, PeriodDriver, RandomnessSource, ScriptedClient,
};

/// Run a local multi-agent quorum simulation.
#[derive(Parser)]
#[command(name = "quorum-agent", version)]
struct Cli {
    /// Path to a TOML config file (defaults to QUORUM_* env vars).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of full periods to run.
    #[arg(long, default_value_t = 2)]
    periods: u64,

    /// Demo work items to seed the queue with.
    #[arg(long, default_value_t = 4)]
    submissions: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AgentConfig::load(path)?,
        None => AgentConfig::default(),
    };
    info!(
        agents = config.agent_count,
        batch_size = config.batch_size,
        beacon = config.beacon.is_some(),
        completion = config.completion.is_some(),
        "Quorum simulation starting"
    );

    let queue = Arc::new(InMemoryQueue::new());
    let base = chrono::Utc::now();
    for i in 0..cli.submissions {
        let kind = if i % 2 == 0 {
            WorkKind::Completion
        } else {
            WorkKind::Chat
        };
        let mut item = WorkItem::new(kind, format!("demo request {i}"))
            .with_request_time(base + chrono::Duration::milliseconds(i as i64));
        if kind == WorkKind::Chat {
            item = item.with_memory(format!("memory-{}", i % 2));
        }
        queue.submit(item).await;
    }

    let client: Arc<dyn CompletionClient> = match &config.completion {
        Some(completion) => Arc::new(HttpCompletionClient::new(completion)),
        None => Arc::new(ScriptedClient::new()),
    };
    let randomness: Arc<dyn RandomnessSource> = match &config.beacon {
        Some(beacon) => Arc::new(DrandBeacon::new(beacon)),
        None => Arc::new(LocalRandomness::new("quorum-sim")),
    };

    let agents = (0..config.agent_count)
        .map(|i| {
            AgentContext::new(
                AgentId::new(format!("agent-{i}")),
                queue.clone(),
                client.clone(),
                randomness.clone(),
                config.batch_size,
            )
        })
        .collect();

    let mut driver = PeriodDriver::new(agents);
    for _ in 0..cli.periods {
        driver.run_period().await?;
    }

    let data = driver.data();
    info!(
        periods = data.period_count,
        responses = data.responses.len(),
        pending = data.requests.len(),
        dead_letters = data.dead_letters.len(),
        published = queue.published().await.len(),
        "Simulation finished"
    );
    for item in queue.published().await {
        info!(id = %item.id, output = item.output.as_deref().unwrap_or(""), "  response");
    }

    Ok(())
}
