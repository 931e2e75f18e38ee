use anyhow::Result;
use colored::*;
use marshal_core::manager::BuildManager;

pub async fn execute(manager: &BuildManager, tasks: &[String]) -> Result<()> {
    println!("{} {}", "Running".bold(), tasks.join(", ").cyan());
    println!();

    // Execute tasks using the build manager
    manager
        .run(tasks)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run task: {}", e))?;

    println!();
    println!(
        "{} {}",
        "✓".green().bold(),
        "All tasks completed successfully!".green().bold()
    );

    // Servers and watchers started by the run keep the process alive
    manager
        .wait_for_background()
        .await
        .map_err(|e| anyhow::anyhow!("Failed while serving: {}", e))?;

    Ok(())
}
