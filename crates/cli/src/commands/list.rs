use anyhow::Result;
use colored::*;
use marshal_core::manager::BuildManager;

pub fn execute(manager: &BuildManager) -> Result<()> {
    let result = manager.list_tasks();

    println!("{}", "Tasks".bold().underline());

    if result.tasks.is_empty() {
        println!("  {}", "No tasks found".dimmed());
        return Ok(());
    }

    for task in &result.tasks {
        let name = match result.task_colors.get(&task.name) {
            Some(color) => task.name.color(*color).bold(),
            None => task.name.blue().bold(),
        };

        match &task.description {
            Some(description) => println!("{} {}", name, description.dimmed()),
            None => println!("{}", name),
        }

        if !task.dependencies.is_empty() {
            println!("  {} {}", "needs:".dimmed(), task.dependencies.join(", "));
        }
        if task.is_composite() {
            println!("  {} {}", "runs:".dimmed(), task.plan.join(" -> "));
        }
    }

    Ok(())
}
