use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use marshal_core::manager::{BuildManager, BuildManagerConfig};
use tracing_subscriber::EnvFilter;

mod commands;

/// Task run when no command is given
const DEFAULT_TASK: &str = "default";

/// Marshal - A front-end build and deploy tool
#[derive(Parser)]
#[command(name = "marshal")]
#[command(about = "Build, serve and package front-end applications")]
#[command(version)]
struct Cli {
    /// Path to the project root (defaults to current directory)
    #[arg(short, long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run tasks one after another
    Run {
        /// Task names, executed in the given order
        #[arg(required = true)]
        tasks: Vec<String>,
    },
    /// List registered tasks
    List,
    /// Show execution plan for a task without running it
    Plan {
        /// Task name
        task: String,
    },
    /// Show the task dependency graph
    Graph,
    /// Any other word is treated as a task name: `marshal build deploy`
    #[command(external_subcommand)]
    External(Vec<String>),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("MARSHAL_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Initialize build manager with all business logic
    let manager = BuildManager::new(BuildManagerConfig {
        project_root: cli.root,
    })
    .map_err(|e| anyhow::anyhow!("Failed to initialize project: {}", e))?;

    // Execute command (CLI layer only handles presentation)
    match cli.command {
        None => commands::run::execute(&manager, &[DEFAULT_TASK.to_string()]).await,
        Some(Commands::Run { tasks }) | Some(Commands::External(tasks)) => {
            commands::run::execute(&manager, &tasks).await
        }
        Some(Commands::List) => commands::list::execute(&manager),
        Some(Commands::Plan { task }) => commands::plan::execute(&manager, &task),
        Some(Commands::Graph) => commands::graph::execute(&manager),
    }
}
