//! Result types for build manager operations
//!
//! This module contains the result types returned by [`crate::manager::BuildManager`],
//! providing a centralized location for output structures.

use std::collections::HashMap;

use colored::Color;

use crate::execution::spec::RunStep;
use crate::registry::{Task, TaskAction};

/// Information about a registered task
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: String,
    pub description: Option<String>,
    pub dependencies: Vec<String>,
    /// Rendered steps of a composite task, empty for plain tasks
    pub plan: Vec<String>,
}

impl TaskInfo {
    pub fn is_composite(&self) -> bool {
        !self.plan.is_empty()
    }
}

/// Result of listing tasks
#[derive(Debug)]
pub struct TaskListResult {
    pub tasks: Vec<TaskInfo>,
    pub task_colors: HashMap<String, Color>,
}

/// Result of task execution planning
#[derive(Debug)]
pub struct TaskPlanResult {
    pub task_name: String,
    /// Every task the run would touch, dependencies first
    pub order: Vec<String>,
    /// The same tasks grouped by dependency level
    pub levels: Vec<Vec<String>>,
    pub task_colors: HashMap<String, Color>,
}

/// Result of getting the dependency graph
#[derive(Debug)]
pub struct DependencyGraphResult {
    pub graph: petgraph::Graph<String, ()>,
}

impl From<&Task> for TaskInfo {
    fn from(task: &Task) -> Self {
        let plan = match &task.action {
            TaskAction::Step(_) => Vec::new(),
            TaskAction::Plan(spec) => spec
                .steps()
                .iter()
                .map(|step| match step {
                    RunStep::Task(name) => name.clone(),
                    RunStep::Parallel(names) => format!("[{}]", names.join(", ")),
                })
                .collect(),
        };

        Self {
            name: task.name.clone(),
            description: task.description.clone(),
            dependencies: task.dependencies.clone(),
            plan,
        }
    }
}
