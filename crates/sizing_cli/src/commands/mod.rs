//! CLI command definitions.

use clap::{Parser, Subcommand};

pub mod agents;
pub mod breakdown;

/// sizing - multi-agent feature breakdown
#[derive(Parser)]
#[command(name = "sizing")]
#[command(version, about = "Break a feature ticket down into sized epics and stories")]
#[command(long_about = r#"
sizing runs a panel of analysis agents over one feature ticket and
synthesizes their output into epics and estimated stories.

COMMANDS:
  breakdown  → Analyze a ticket and print the breakdown
  agents     → List the analysis agents that would run

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments or request
  3 - Ticket could not be fetched
  4 - Run cancelled

Set RUST_LOG to override the log filter.
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Break a ticket down into epics and stories
    Breakdown(breakdown::BreakdownArgs),

    /// List registered analysis agents
    Agents(agents::AgentsArgs),
}
