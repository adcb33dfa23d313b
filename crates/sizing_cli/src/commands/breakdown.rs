//! Breakdown command - Analyze a ticket and print its breakdown.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use tracing::{info, warn};

use sizing_core::{
    BreakdownRequest, BreakdownWorkflow, FetchPolicy, FileTicketSource, MockItemCreator,
    StaticTicketSource, TicketFetcher, WorkflowConfig, WorkflowResult,
};
use sizing_model::{Ticket, WorkItem};

use super::agents::load_registry;

#[derive(Args)]
pub struct BreakdownArgs {
    /// Ticket id to break down
    #[arg(short, long)]
    pub ticket: String,

    /// Additional context passed to every agent
    #[arg(short, long)]
    pub description: Option<String>,

    /// Requesting user
    #[arg(short, long)]
    pub user: Option<String>,

    /// Create the resulting epics and stories
    #[arg(long)]
    pub create_items: bool,

    /// JSON file with one ticket or an array of tickets
    #[arg(long, env = "SIZING_TICKETS_FILE")]
    pub tickets_file: Option<PathBuf>,

    /// Summary used when no tickets file is given
    #[arg(long)]
    pub summary: Option<String>,

    /// Directory of persona YAML files (defaults to the built-in set)
    #[arg(long, env = "SIZING_AGENTS_DIR")]
    pub agents_dir: Option<PathBuf>,

    /// Workflow configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Continue with a placeholder ticket if fetching fails
    #[arg(long)]
    pub lenient: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: BreakdownArgs) -> Result<()> {
    let config = load_config(&args)?;
    let registry = load_registry(args.agents_dir.as_deref())?;
    info!(
        "Breaking down {} with {} agent(s)",
        args.ticket,
        registry.len()
    );

    let source: Arc<dyn TicketFetcher> = match &args.tickets_file {
        Some(path) => Arc::new(FileTicketSource::new(path)),
        None => {
            let summary = args
                .summary
                .clone()
                .unwrap_or_else(|| format!("Feature from {}", args.ticket.trim()));
            Arc::new(StaticTicketSource::new().with_ticket(Ticket::new(args.ticket.trim(), summary)))
        }
    };

    let project = Ticket::new(args.ticket.trim(), "").project_key();
    let workflow = BreakdownWorkflow::new(registry, source)
        .with_config(config)
        .with_creator(Arc::new(MockItemCreator::new(project)));

    let mut request = BreakdownRequest::new(args.ticket.clone()).with_create_items(args.create_items);
    if let Some(description) = &args.description {
        request = request.with_description(description.clone());
    }
    if let Some(user) = &args.user {
        request = request.with_user(user.clone());
    }

    let run = workflow.start(request)?;

    let cancel = run.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling run");
            cancel.cancel();
        }
    });

    let mut events = run.subscribe();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.next().await {
            eprintln!("[{:>3}%] {}: {}", event.progress, event.stage, event.message);
        }
    });

    let result = run.wait().await;
    if let Err(e) = printer.await {
        warn!("Progress printer stopped: {}", e);
    }
    let result = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_summary(&result);
    }

    Ok(())
}

fn load_config(args: &BreakdownArgs) -> Result<WorkflowConfig> {
    let config = match &args.config {
        Some(path) => WorkflowConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => WorkflowConfig::default(),
    };

    let mut config = config.with_env_overrides(|key| std::env::var(key).ok());
    if args.lenient {
        config = config.with_fetch_policy(FetchPolicy::Lenient);
    }
    Ok(config)
}

/// `[points pts, priority] title` for a story.
fn story_line(story: &WorkItem) -> String {
    let mut tags = Vec::new();
    if let Some(points) = story.story_points() {
        tags.push(format!("{} pts", points));
    }
    if let Some(priority) = story.priority() {
        tags.push(priority.to_string());
    }
    format!("[{}] {}", tags.join(", "), story.title)
}

fn print_summary(result: &WorkflowResult) {
    println!();
    println!("✅ {}", result.breakdown_summary);
    if result.degraded {
        println!("⚠️  Ticket could not be fetched; placeholder details were used");
    }
    println!();

    for epic in &result.epics {
        println!("📦 {}", epic.title);
        for story in result
            .stories
            .iter()
            .filter(|s| s.parent_epic() == Some(epic.title.as_str()))
        {
            println!("   - {}", story_line(story));
        }
    }

    println!();
    println!(
        "🤖 Agents: {} succeeded, {} failed",
        result.agent_results.success_count(),
        result.agent_results.failure_count()
    );
    for failure in result.agent_results.failures() {
        println!("   ⚠️  {}", failure.agent_name());
    }

    if let Some(ids) = &result.created_item_ids {
        println!();
        println!("📝 Created {} item(s): {}", ids.len(), ids.join(", "));
        if let Some(report) = &result.creation_report {
            for error in &report.errors {
                println!("   ❌ {}", error);
            }
        }
    }

    println!();
    println!("⏱️  {:.2}s (run {})", result.processing_time_seconds, result.run_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use sizing_model::Priority;

    #[test]
    fn test_story_line_uses_priority_display() {
        let story = WorkItem::story("Add registry API", "Add registry API", "Platform & Architecture: X")
            .with_points(5)
            .with_priority(Priority::High);
        assert_eq!(story_line(&story), format!("[5 pts, {}] Add registry API", Priority::High));

        let story = WorkItem::story("Write docs", "Write docs", "Delivery & Enablement: X");
        assert_eq!(story_line(&story), format!("[{}] Write docs", Priority::default()));
    }
}
