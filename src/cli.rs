//! Command line entry point shared by both agent binaries.
//!
//! Parses flags, initializes logging, then runs the HTTP server inside the
//! lifetime of the MCP tool provider.

use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, FromArgMatches, Parser};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::a2a::{InMemoryTaskStore, RequestHandler, TaskExecutor};
use crate::agent::{ReactAgent, StreamingAdapter};
use crate::api::{self, AppState};
use crate::config::{Config, DEFAULT_HOST};
use crate::llm::{GeminiClient, LlmClient};
use crate::mcp::ToolProvider;
use crate::profile::AgentProfile;
use crate::tools::ToolRegistry;

#[derive(Debug, Clone, Parser)]
#[command(version)]
pub struct Args {
    /// Address to bind
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to bind (defaults to the agent's own port)
    #[arg(long)]
    pub port: Option<u16>,

    /// Log level or filter directive; RUST_LOG takes precedence
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Parse process arguments, using the profile's description as help text.
    pub fn parse_for(profile: &AgentProfile) -> Self {
        let matches = Self::command().about(profile.description).get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }
}

/// Initialize the global tracing subscriber.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Run an agent service until Ctrl-C.
pub async fn run(profile: AgentProfile) -> anyhow::Result<()> {
    let args = Args::parse_for(&profile);
    let env_file = dotenvy::dotenv_override();
    init_logging(&args.log_level);
    if let Ok(path) = env_file {
        tracing::debug!("Loaded environment from {}", path.display());
    }

    let result = run_with_args(profile, args).await;
    if let Err(e) = &result {
        tracing::error!("An error occurred during server startup: {:#}", e);
    }
    result
}

async fn run_with_args(profile: AgentProfile, args: Args) -> anyhow::Result<()> {
    let mut config = Config::from_env(&profile).context("Configuration error")?;
    config.host = args.host;
    if let Some(port) = args.port {
        config.port = port;
    }
    tracing::info!(agent = profile.name, model = %config.model.model, "Loaded configuration");

    tracing::info!("Starting MCP tool provider");
    let mut provider = ToolProvider::start(&config.mcp_servers)
        .await
        .context("Failed to start MCP tool provider")?;

    let result = serve(profile, &config, &provider).await;

    provider.shutdown().await;
    tracing::info!("MCP tool provider stopped");
    result
}

async fn serve(profile: AgentProfile, config: &Config, provider: &ToolProvider) -> anyhow::Result<()> {
    let tools = ToolRegistry::new(provider.tools());
    for tool in tools.list_tools() {
        tracing::debug!(tool = %tool.name, "Loaded MCP tool");
    }

    let llm: Arc<dyn LlmClient> = Arc::new(GeminiClient::new(&config.model));
    let agent = Arc::new(
        ReactAgent::new(llm, tools, &profile, config.max_iterations)
            .context("Failed to create agent")?,
    );

    let profile = Arc::new(profile);
    let executor = TaskExecutor::new(StreamingAdapter::new(agent, Arc::clone(&profile)));
    let state = Arc::new(AppState {
        card: profile.agent_card(&config.public_url()),
        handler: RequestHandler::new(executor, Arc::new(InMemoryTaskStore::new())),
    });

    let shutdown = CancellationToken::new();
    let force = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        let force = force.clone();
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to listen for Ctrl-C: {}", e);
                return;
            }
            tracing::info!("Shutdown signal received, draining in-flight requests");
            shutdown.cancel();

            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Second shutdown signal received, stopping now");
                force.cancel();
            }
        }
    });

    let drain_deadline = async move {
        tokio::select! {
            _ = tokio::time::sleep(api::SHUTDOWN_GRACE) => {}
            _ = force.cancelled() => {}
        }
    };

    api::serve(state, &config.host, config.port, shutdown, drain_deadline)
        .await
        .with_context(|| format!("Server error on {}:{}", config.host, config.port))
}
