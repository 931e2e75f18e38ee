//! User-defined tasks and color management
//!
//! Turns the command tasks declared in `.marshal/tasks/*.yml` into registry entries and
//! provides consistent task colors for terminal output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use colored::*;

use crate::configs::tasks::{Command as TaskCommand, TaskConfig};
use crate::execution::command::CommandExecutor;
use crate::registry::{Task, TaskRegistry};
use crate::types::{MarshalError, MarshalResult};

/// Get a consistent color for a task name
pub fn get_task_color(task_name: &str) -> Color {
    // Use a simple hash of the task name bytes for consistent colors
    let hash = task_name
        .bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));

    // Jewel tones that read as labels rather than log levels
    let colors = [
        Color::TrueColor {
            r: 147,
            g: 112,
            b: 219,
        },
        Color::TrueColor {
            r: 64,
            g: 224,
            b: 208,
        },
        Color::TrueColor {
            r: 255,
            g: 140,
            b: 0,
        },
        Color::TrueColor {
            r: 199,
            g: 21,
            b: 133,
        },
        Color::TrueColor {
            r: 72,
            g: 209,
            b: 204,
        },
        Color::TrueColor {
            r: 138,
            g: 43,
            b: 226,
        },
    ];

    colors[(hash % colors.len() as u64) as usize]
}

/// Register every configured command task
pub fn register_user_tasks(
    registry: &mut TaskRegistry,
    project_root: &Path,
    configs: Vec<TaskConfig>,
) -> MarshalResult<()> {
    for config in configs {
        let task = user_task(project_root, config)?;
        registry.register(task)?;
    }
    Ok(())
}

fn user_task(project_root: &Path, config: TaskConfig) -> MarshalResult<Task> {
    let invocation = match (config.script, config.command) {
        (Some(script), None) => Invocation::Script(script),
        (None, Some(TaskCommand::Single(cmd))) => Invocation::Shell(cmd),
        (None, Some(TaskCommand::Multiple(cmds))) => Invocation::Args(cmds),
        (Some(_), Some(_)) => {
            return Err(MarshalError::Config(format!(
                "Task '{}' declares both a script and a command",
                config.name
            )))
        }
        (None, None) => {
            return Err(MarshalError::Config(format!(
                "Task '{}' has no script or command to execute",
                config.name
            )))
        }
    };

    let root: PathBuf = project_root.to_path_buf();
    let invocation = Arc::new(invocation);
    let name = config.name.clone();
    let mut task = Task::new(config.name, move || {
        let root = root.clone();
        let invocation = Arc::clone(&invocation);
        let name = name.clone();
        async move {
            let executor = CommandExecutor::new(&root).with_env("MARSHAL_TASK", name);
            invocation.run(&executor).await
        }
    })
    .with_dependencies(config.dependencies.unwrap_or_default());

    if let Some(description) = config.description {
        task = task.with_description(description);
    }
    Ok(task)
}

enum Invocation {
    Script(String),
    Shell(String),
    Args(Vec<String>),
}

impl Invocation {
    async fn run(&self, executor: &CommandExecutor<'_>) -> MarshalResult<()> {
        match self {
            Invocation::Script(script) => executor.execute_script(script).await,
            Invocation::Shell(cmd) => executor.execute_shell_command(cmd).await,
            Invocation::Args(cmds) => match cmds.split_first() {
                Some((program, args)) => executor.execute_command_with_args(program, args).await,
                None => Ok(()),
            },
        }
    }
}
