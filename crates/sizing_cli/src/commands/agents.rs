//! Agents command - List analysis agents.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use sizing_agents::AgentRegistry;

#[derive(Args)]
pub struct AgentsArgs {
    /// Directory of persona YAML files (defaults to the built-in set)
    #[arg(long, env = "SIZING_AGENTS_DIR")]
    pub agents_dir: Option<PathBuf>,
}

pub async fn execute(args: AgentsArgs) -> Result<()> {
    let registry = load_registry(args.agents_dir.as_deref())?;

    println!("🤖 {} agent(s) registered:", registry.len());
    for agent in registry.agents() {
        println!(
            "   {:<22} {:<24} {}",
            agent.name(),
            agent.theme().title(),
            agent.description()
        );
    }

    Ok(())
}

/// Registry from a persona directory, or the built-in personas.
pub fn load_registry(dir: Option<&std::path::Path>) -> Result<AgentRegistry> {
    let registry = match dir {
        Some(dir) => AgentRegistry::load_from_dir(dir)?,
        None => AgentRegistry::builtin()?,
    };
    if registry.is_empty() {
        anyhow::bail!("No agents found; check the agents directory argument");
    }
    Ok(registry)
}
