//! Task registry
//!
//! Maps task names to [`Task`]s and keeps a directed graph of every reference a task
//! makes (its dependencies plus the tasks named in a composite plan). Edges point from
//! a task to what it needs, so a dependency is always a neighbor. A registration that
//! would close a cycle is rejected and leaves the registry unchanged.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use petgraph::algo::{is_cyclic_directed, kosaraju_scc};
use petgraph::prelude::*;

use crate::execution::spec::RunSpec;
use crate::types::{MarshalError, MarshalResult};

/// Boxed future returned by a task step
pub type TaskFuture = Pin<Box<dyn Future<Output = MarshalResult<()>> + Send>>;

/// Zero-argument operation that performs the task's side effect
pub type TaskStep = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

#[derive(Clone)]
pub enum TaskAction {
    /// A single operation, complete when its future resolves
    Step(TaskStep),
    /// A composite task that runs another plan
    Plan(RunSpec),
}

#[derive(Clone)]
pub struct Task {
    pub name: String,
    pub description: Option<String>,
    pub dependencies: Vec<String>,
    pub action: TaskAction,
}

impl Task {
    /// Task backed by an asynchronous operation
    pub fn new<F, Fut>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = MarshalResult<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: None,
            dependencies: Vec::new(),
            action: TaskAction::Step(Arc::new(move || Box::pin(action()) as TaskFuture)),
        }
    }

    /// Task backed by a synchronous side effect; it completes as soon as the call returns
    pub fn sync<F>(name: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> MarshalResult<()> + Send + Sync + 'static,
    {
        let action = Arc::new(action);
        Self::new(name, move || {
            let result = action();
            async move { result }
        })
    }

    /// Task that runs a nested plan
    pub fn composite(name: impl Into<String>, plan: RunSpec) -> Self {
        Self {
            name: name.into(),
            description: None,
            dependencies: Vec::new(),
            action: TaskAction::Plan(plan),
        }
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Every task name this task needs: dependencies first, then plan members
    pub fn references(&self) -> Vec<&str> {
        let mut refs: Vec<&str> = self.dependencies.iter().map(String::as_str).collect();
        if let TaskAction::Plan(plan) = &self.action {
            refs.extend(plan.task_names());
        }
        refs
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.action, TaskAction::Plan(_))
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let action = match &self.action {
            TaskAction::Step(_) => "step".to_string(),
            TaskAction::Plan(plan) => format!("{:?}", plan),
        };
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("dependencies", &self.dependencies)
            .field("action", &action)
            .finish()
    }
}

#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Task>,
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task.
    ///
    /// References to tasks that are not registered yet are allowed; they are checked by
    /// [`TaskRegistry::validate_references`] and again when a run starts.
    pub fn register(&mut self, task: Task) -> MarshalResult<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(MarshalError::DuplicateTask(task.name));
        }

        let from = self.node_for(&task.name);
        let mut added = Vec::new();
        for reference in task.references() {
            let to = self.node_for(reference);
            if self.graph.find_edge(from, to).is_none() {
                added.push(self.graph.add_edge(from, to, ()));
            }
        }

        if is_cyclic_directed(&self.graph) {
            let cycle = self.cycle_through(from);
            // Newest edges sit at the end of the edge list, so removing them in reverse
            // keeps the remaining indices valid.
            for edge in added.into_iter().rev() {
                self.graph.remove_edge(edge);
            }
            return Err(MarshalError::DependencyCycle(cycle));
        }

        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> MarshalResult<&Task> {
        self.tasks
            .get(name)
            .ok_or_else(|| MarshalError::TaskNotRegistered(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered task names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tasks.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The reference graph; every node is a registered task once
    /// [`TaskRegistry::validate_references`] has passed
    pub fn graph(&self) -> &DiGraph<String, ()> {
        &self.graph
    }

    /// Fail with [`MarshalError::TaskNotRegistered`] if any task references an unknown name
    pub fn validate_references(&self) -> MarshalResult<()> {
        for name in self.names() {
            let task = &self.tasks[&name];
            for reference in task.references() {
                if !self.tasks.contains_key(reference) {
                    return Err(MarshalError::Config(format!(
                        "Task '{}' references '{}' which is not registered",
                        task.name, reference
                    )));
                }
            }
        }
        Ok(())
    }

    /// Every task reachable from `name`, dependencies before dependents.
    ///
    /// Follows declaration order, so the result matches what a run would execute.
    pub fn execution_order(&self, name: &str) -> MarshalResult<Vec<String>> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        self.visit(name, &mut visited, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        name: &str,
        visited: &mut HashSet<String>,
        order: &mut Vec<String>,
    ) -> MarshalResult<()> {
        if !visited.insert(name.to_string()) {
            return Ok(());
        }
        let task = self.lookup(name)?;
        for reference in task.references() {
            self.visit(reference, visited, order)?;
        }
        order.push(name.to_string());
        Ok(())
    }

    fn node_for(&mut self, name: &str) -> NodeIndex {
        if let Some(&node) = self.nodes.get(name) {
            return node;
        }
        let node = self.graph.add_node(name.to_string());
        self.nodes.insert(name.to_string(), node);
        node
    }

    /// Names in the strongly connected component containing `node`, formatted as a path
    fn cycle_through(&self, node: NodeIndex) -> Vec<String> {
        let component = kosaraju_scc(&self.graph)
            .into_iter()
            .find(|component| component.contains(&node))
            .unwrap_or_else(|| vec![node]);

        let mut cycle: Vec<String> = component
            .iter()
            .map(|index| self.graph[*index].clone())
            .collect();
        cycle.sort();
        if let Some(first) = cycle.first().cloned() {
            cycle.push(first);
        }
        cycle
    }
}
