//! Study planner agent - HTTP server entry point.

use study_agents::{cli, profile::AgentProfile};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::run(AgentProfile::study_planner()).await
}
