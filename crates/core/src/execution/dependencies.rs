//! Task dependency management
//!
//! Groups the closure of a task into dependency levels: level 0 needs nothing, and
//! every other task sits one level above the deepest task it references. Tasks in the
//! same level never depend on each other.

use std::collections::HashMap;

use crate::registry::TaskRegistry;
use crate::types::MarshalResult;

/// Group the tasks reachable from `task_name` by their dependency levels
pub fn group_by_dependency_levels(
    registry: &TaskRegistry,
    task_name: &str,
) -> MarshalResult<Vec<Vec<String>>> {
    // Dependencies come before dependents, so every reference already has a level
    let order = registry.execution_order(task_name)?;

    let mut level_of: HashMap<&str, usize> = HashMap::new();
    let mut levels: Vec<Vec<String>> = Vec::new();

    for name in &order {
        let task = registry.lookup(name)?;
        let level = task
            .references()
            .iter()
            .filter_map(|reference| level_of.get(reference))
            .map(|level| level + 1)
            .max()
            .unwrap_or(0);

        level_of.insert(name.as_str(), level);
        if levels.len() <= level {
            levels.resize_with(level + 1, Vec::new);
        }
        levels[level].push(name.clone());
    }

    Ok(levels)
}
