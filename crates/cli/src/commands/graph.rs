use anyhow::Result;
use colored::*;
use marshal_core::manager::BuildManager;

pub fn execute(manager: &BuildManager) -> Result<()> {
    println!("{}", "Task Dependency Graph:".bold().underline());

    let graph = manager.get_dependency_graph().graph;

    let mut nodes: Vec<_> = graph.node_indices().collect();
    nodes.sort_by(|a, b| graph[*a].cmp(&graph[*b]));

    for node_index in nodes {
        println!("{}", graph[node_index].blue().bold());

        let mut deps: Vec<&str> = graph
            .neighbors(node_index)
            .filter_map(|neighbor| graph.node_weight(neighbor))
            .map(String::as_str)
            .collect();
        deps.sort_unstable();

        if !deps.is_empty() {
            println!("  {} {}", "depends on:".dimmed(), deps.join(", "));
        } else {
            println!("  {}", "no dependencies".dimmed());
        }
        println!();
    }

    Ok(())
}
