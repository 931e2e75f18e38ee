use anyhow::Result;
use colored::*;
use marshal_core::manager::BuildManager;

pub fn execute(manager: &BuildManager, task: &str) -> Result<()> {
    println!("{} {}", "Execution plan for".bold(), task.cyan());

    // Get execution plan from the build manager
    let plan = manager
        .get_execution_plan(task)
        .map_err(|e| anyhow::anyhow!("Failed to get execution plan: {}", e))?;

    println!("\n{}:", "Execution order".bold());
    for (i, name) in plan.order.iter().enumerate() {
        match plan.task_colors.get(name) {
            Some(color) => println!("  {}. {}", i + 1, name.color(*color)),
            None => println!("  {}. {}", i + 1, name),
        }
    }

    println!("\n{}:", "Dependency levels".bold());
    for (level, names) in plan.levels.iter().enumerate() {
        println!("  {} {}", format!("{}:", level).dimmed(), names.join(", "));
    }

    Ok(())
}
